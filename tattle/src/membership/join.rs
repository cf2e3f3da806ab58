use crate::core::{Address, GossipMessage, MembershipError, MsgKind, Result, Transport};
use crate::membership::{FailureDetector, MembershipTable, Round};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Lifecycle of a node.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum NodeState {
  /// Created, nothing initialized.
  Uninitialized,
  /// Table initialized, not yet introduced to the group.
  Ready,
  /// A join request is outstanding.
  AwaitingJoin,
  /// Member of the group; gossiping and detecting failures.
  InGroup,
  /// Crashed or stopped. Terminal.
  Failed,
}

/// Introduces a node to the group through a fixed introducer.
///
/// A request that goes unanswered for `timeout` rounds is sent again, up to `max_attempts` times
/// in total. After that the join has failed for good.
#[derive(Clone, Debug)]
pub struct JoinProtocol {
  introducer: Address,
  timeout: Round,
  max_attempts: usize,
  attempts: usize,
  requested_at: Round,
}
impl JoinProtocol {
  /// Creates a join protocol that asks `introducer`, re-asking every `timeout` rounds.
  pub fn new(introducer: Address, timeout: Round, max_attempts: usize) -> JoinProtocol {
    JoinProtocol {
      introducer: introducer,
      timeout: timeout,
      max_attempts: max_attempts,
      attempts: 0,
      requested_at: 0,
    }
  }

  /// The node every join request goes to.
  pub fn introducer(&self) -> &Address {
    &self.introducer
  }

  /// Number of join requests sent so far.
  pub fn attempts(&self) -> usize {
    self.attempts
  }

  /// Starts the join. The introducer founds the group and is in it immediately; everyone else
  /// asks the introducer and waits.
  pub fn bootstrap<T: Transport + ?Sized>(
    &mut self,
    table: &MembershipTable,
    detector: &FailureDetector,
    now: Round,
    transport: &mut T,
  ) -> Result<NodeState> {
    if *table.self_address() == self.introducer {
      info!(node = %self.introducer, "starting up group");
      return Ok(NodeState::InGroup);
    }
    self.request(table, detector, now, transport)?;
    Ok(NodeState::AwaitingJoin)
  }

  /// Called each round while waiting for a reply. Re-sends the request once `timeout` rounds
  /// have passed, and fails once every attempt has gone unanswered.
  pub fn poll<T: Transport + ?Sized>(
    &mut self,
    table: &MembershipTable,
    detector: &FailureDetector,
    now: Round,
    transport: &mut T,
  ) -> Result<()> {
    if now.saturating_sub(self.requested_at) < self.timeout {
      return Ok(());
    }
    if self.attempts >= self.max_attempts {
      return Err(MembershipError::JoinFailed {
        addr: *table.self_address(),
        introducer: self.introducer,
        attempts: self.attempts,
      });
    }
    debug!(node = %table.self_address(), attempt = self.attempts + 1, "join timed out, retrying");
    self.request(table, detector, now, transport)
  }

  /// Answers a join request with the unsuspected part of the local view.
  pub fn reply<T: Transport + ?Sized>(
    &self,
    table: &MembershipTable,
    detector: &FailureDetector,
    to: &Address,
    now: Round,
    transport: &mut T,
  ) {
    let me = *table.self_address();
    let reply = GossipMessage::new(MsgKind::JoinReply, me, detector.snapshot(table, now));
    let sent = reply
      .encode()
      .map_err(MembershipError::from)
      .and_then(|payload| transport.send(to, payload).map_err(MembershipError::from));
    if let Err(e) = sent {
      trace!(node = %me, requester = %to, error = %e, "join reply not sent");
    }
  }

  fn request<T: Transport + ?Sized>(
    &mut self,
    table: &MembershipTable,
    detector: &FailureDetector,
    now: Round,
    transport: &mut T,
  ) -> Result<()> {
    let me = *table.self_address();
    let msg = GossipMessage::new(MsgKind::JoinRequest, me, detector.snapshot(table, now));
    transport.send(&self.introducer, msg.encode()?)?;
    self.attempts += 1;
    self.requested_at = now;
    info!(node = %me, introducer = %self.introducer, attempt = self.attempts, "trying to join");
    Ok(())
  }
}
