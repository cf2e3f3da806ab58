use crate::core::{Address, EventLog, GossipMessage, MembershipError, MsgKind, Result, Transport};
use crate::membership::{
  FailureDetector, GossipDisseminator, HeartbeatPolicy, JoinProtocol, MembershipConfig,
  MembershipEvent, MembershipTable, MergeEngine, NodeState, Round,
};
use tracing::{debug, info, trace, warn};
use validator::Validate;

/// Drives one node, one round at a time.
///
/// Each [`tick`](NodeController::tick) drains the transport, dispatches every message, and, once
/// the node is in the group, evicts expired members, advances the node's own heartbeat and gossips.
/// The controller owns its table; nothing else ever mutates it.
pub struct NodeController<T: Transport, L: EventLog> {
  addr: Address,
  config: MembershipConfig,
  state: NodeState,
  table: Option<MembershipTable>,
  detector: FailureDetector,
  merger: MergeEngine,
  gossip: GossipDisseminator,
  join: JoinProtocol,
  transport: T,
  log: L,
}
impl<T: Transport, L: EventLog> NodeController<T, L> {
  /// Creates an [`Uninitialized`](NodeState::Uninitialized) node. Nothing happens until
  /// [`start`](NodeController::start).
  pub fn new(addr: Address, config: MembershipConfig, transport: T, log: L) -> Self {
    let detector = FailureDetector::new(config.fail_threshold, config.remove_threshold);
    NodeController {
      addr: addr,
      state: NodeState::Uninitialized,
      table: None,
      detector: detector,
      merger: MergeEngine::new(detector, config.suspicion),
      gossip: GossipDisseminator::new(config.fanout, config.rng_seed),
      join: JoinProtocol::new(config.introducer, config.join_timeout, config.join_attempts),
      config: config,
      transport: transport,
      log: log,
    }
  }

  /// Initializes the table and introduces this node to the group. Any error leaves the node
  /// [`Failed`](NodeState::Failed); the caller is expected to stop it.
  pub fn start(&mut self, now: Round) -> Result<()> {
    if self.state != NodeState::Uninitialized {
      return Err(MembershipError::AlreadyStarted {
        addr: self.addr,
        state: self.state,
      });
    }
    if let Err(e) = self.config.validate() {
      warn!(node = %self.addr, error = %e, "init failed");
      self.state = NodeState::Failed;
      return Err(e.into());
    }
    let table = self.table.insert(MembershipTable::new(self.addr, now));
    self.state = NodeState::Ready;
    match self
      .join
      .bootstrap(table, &self.detector, now, &mut self.transport)
    {
      Ok(state) => {
        self.state = state;
        Ok(())
      }
      Err(e) => {
        warn!(node = %self.addr, error = %e, "unable to join self to group");
        self.state = NodeState::Failed;
        Err(e)
      }
    }
  }

  /// Runs one round. Does nothing once the node has failed. Returns an error only when the node
  /// fails during this round.
  pub fn tick(&mut self, now: Round) -> Result<()> {
    if !self.is_running() {
      return Ok(());
    }
    for payload in self.transport.receive() {
      match GossipMessage::decode(&payload) {
        Ok(msg) => self.dispatch(msg, now),
        Err(e) => debug!(node = %self.addr, error = %e, "dropping undecodable payload"),
      }
    }
    match self.state {
      NodeState::AwaitingJoin => self.poll_join(now),
      NodeState::InGroup => {
        self.gossip_round(now);
        Ok(())
      }
      _ => Ok(()),
    }
  }

  /// Marks this node crashed. It stops sending and receiving for good.
  pub fn crash(&mut self) {
    if self.state != NodeState::Failed {
      info!(node = %self.addr, "node crashed");
      self.state = NodeState::Failed;
    }
  }

  /// This node's address.
  pub fn address(&self) -> &Address {
    &self.addr
  }

  /// Where this node is in its lifecycle.
  pub fn state(&self) -> NodeState {
    self.state
  }

  /// True while the node takes part in the protocol.
  pub fn is_running(&self) -> bool {
    matches!(self.state, NodeState::AwaitingJoin | NodeState::InGroup)
  }

  /// The membership table, once [`start`](NodeController::start) has built it.
  pub fn table(&self) -> Option<&MembershipTable> {
    self.table.as_ref()
  }

  /// The configuration this node was created with.
  pub fn config(&self) -> &MembershipConfig {
    &self.config
  }

  /// The failure detector applied to this node's table.
  pub fn detector(&self) -> &FailureDetector {
    &self.detector
  }

  /// Join requests sent so far.
  pub fn join_attempts(&self) -> usize {
    self.join.attempts()
  }

  /// The transport this node sends and receives through.
  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// Mutable access to the transport.
  pub fn transport_mut(&mut self) -> &mut T {
    &mut self.transport
  }

  /// The event log this node reports to.
  pub fn log(&self) -> &L {
    &self.log
  }

  fn dispatch(&mut self, msg: GossipMessage, now: Round) {
    let table = match self.table.as_mut() {
      Some(table) => table,
      None => return,
    };
    let events = match (msg.kind, self.state) {
      (MsgKind::JoinRequest, NodeState::InGroup) => {
        let events = self.merger.merge(table, &msg.snapshot, now);
        self
          .join
          .reply(table, &self.detector, &msg.sender, now, &mut self.transport);
        events
      }
      (MsgKind::JoinReply, NodeState::AwaitingJoin) => {
        let events = self.merger.merge(table, &msg.snapshot, now);
        info!(node = %self.addr, via = %msg.sender, members = table.len(), "joined group");
        self.state = NodeState::InGroup;
        events
      }
      (MsgKind::JoinReply, NodeState::InGroup) => self.merger.merge(table, &msg.snapshot, now),
      (MsgKind::Ping, NodeState::InGroup) | (MsgKind::Ping, NodeState::AwaitingJoin) => {
        let events = self.merger.merge(table, &msg.snapshot, now);
        if self.config.heartbeat == HeartbeatPolicy::OnPing {
          table.advance_own(now);
        }
        events
      }
      (kind, state) => {
        trace!(node = %self.addr, from = %msg.sender, ?kind, ?state, "ignoring message");
        return;
      }
    };
    self.emit(&events);
  }

  fn poll_join(&mut self, now: Round) -> Result<()> {
    let table = match self.table.as_ref() {
      Some(table) => table,
      None => return Ok(()),
    };
    let polled = self
      .join
      .poll(table, &self.detector, now, &mut self.transport);
    if let Err(e) = &polled {
      warn!(node = %self.addr, error = %e, "unable to join self to group");
      self.state = NodeState::Failed;
    }
    polled
  }

  fn gossip_round(&mut self, now: Round) {
    let table = match self.table.as_mut() {
      Some(table) => table,
      None => return,
    };
    let removed = self.detector.detect(table, now);
    if self.config.heartbeat == HeartbeatPolicy::EveryRound {
      table.advance_own(now);
    }
    let sent = self
      .gossip
      .disseminate(table, &self.detector, now, &mut self.transport);
    trace!(node = %self.addr, round = now, sent, members = table.len(), "gossip round");
    self.emit(&removed);
  }

  fn emit(&mut self, events: &[MembershipEvent]) {
    for event in events {
      self.log.record(&self.addr, event);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::TransportError;
  use crate::membership::MemberRecord;
  use std::collections::VecDeque;

  /// A transport with a hand-fed inbox that remembers everything sent.
  #[derive(Default)]
  struct Loopback {
    inbox: VecDeque<Vec<u8>>,
    sent: Vec<(Address, GossipMessage)>,
  }
  impl Loopback {
    fn push(&mut self, msg: GossipMessage) {
      self.inbox.push_back(msg.encode().unwrap());
    }
  }
  impl Transport for Loopback {
    fn send(&mut self, to: &Address, payload: Vec<u8>) -> std::result::Result<(), TransportError> {
      self.sent.push((*to, GossipMessage::decode(&payload).unwrap()));
      Ok(())
    }

    fn receive(&mut self) -> Vec<Vec<u8>> {
      self.inbox.drain(..).collect()
    }
  }

  #[derive(Default)]
  struct Events(Vec<MembershipEvent>);
  impl EventLog for Events {
    fn added(&mut self, _: &Address, member: &Address) {
      self.0.push(MembershipEvent::Added(*member));
    }

    fn removed(&mut self, _: &Address, member: &Address) {
      self.0.push(MembershipEvent::Removed(*member));
    }
  }

  fn node(id: u32, config: MembershipConfig) -> NodeController<Loopback, Events> {
    NodeController::new(Address::new(id, 0), config, Loopback::default(), Events::default())
  }

  fn seeded() -> MembershipConfig {
    let mut config = MembershipConfig::default();
    config.rng_seed = Some(1);
    config
  }

  fn rec(id: u32, heartbeat: u64) -> MemberRecord {
    MemberRecord::new(&Address::new(id, 0), heartbeat, 0)
  }

  #[test]
  fn test_lifecycle_of_introducer() {
    let mut n = node(1, seeded());
    assert_eq!(n.state(), NodeState::Uninitialized);
    assert!(n.table().is_none());
    n.tick(0).unwrap();
    assert!(n.transport().sent.is_empty());
    n.start(0).unwrap();
    assert_eq!(n.state(), NodeState::InGroup);
    assert!(matches!(n.start(1), Err(MembershipError::AlreadyStarted { .. })));
    assert_eq!(n.state(), NodeState::InGroup);
  }

  #[test]
  fn test_invalid_config_is_fatal() {
    let mut config = seeded();
    config.fail_threshold = 30;
    let mut n = node(1, config);
    assert!(matches!(n.start(0), Err(MembershipError::InvalidConfig(_))));
    assert_eq!(n.state(), NodeState::Failed);
  }

  #[test]
  fn test_no_gossip_before_join() {
    let mut n = node(2, seeded());
    n.start(0).unwrap();
    assert_eq!(n.state(), NodeState::AwaitingJoin);
    n.tick(1).unwrap();
    n.tick(2).unwrap();
    assert_eq!(n.transport().sent.len(), 1);
    assert_eq!(n.transport().sent[0].1.kind, MsgKind::JoinRequest);
    assert_eq!(n.table().unwrap().own().heartbeat, 0);
  }

  #[test]
  fn test_join_request_gets_reply() {
    let mut n = node(1, seeded());
    n.start(0).unwrap();
    n.transport_mut().push(GossipMessage::new(
      MsgKind::JoinRequest,
      Address::new(2, 0),
      vec![rec(2, 0)],
    ));
    n.tick(1).unwrap();
    let sent = &n.transport().sent;
    assert_eq!(sent[0].0, Address::new(2, 0));
    assert_eq!(sent[0].1.kind, MsgKind::JoinReply);
    assert_eq!(sent[0].1.snapshot.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    // Then a full round of gossip.
    assert_eq!(sent.len(), 1 + 3);
    assert!(sent[1..].iter().all(|(_, m)| m.kind == MsgKind::Ping));
    assert_eq!(n.log().0, vec![MembershipEvent::Added(Address::new(2, 0))]);
  }

  #[test]
  fn test_join_reply_completes_join() {
    let mut n = node(2, seeded());
    n.start(0).unwrap();
    n.transport_mut().push(GossipMessage::new(
      MsgKind::JoinReply,
      Address::new(1, 0),
      vec![rec(1, 4), rec(2, 0)],
    ));
    n.tick(1).unwrap();
    assert_eq!(n.state(), NodeState::InGroup);
    let table = n.table().unwrap();
    assert_eq!(table.get(1).map(|r| (r.heartbeat, r.last_seen)), Some((4, 1)));
    assert_eq!(table.own().heartbeat, 1);
  }

  #[test]
  fn test_join_request_ignored_while_joining() {
    let mut n = node(2, seeded());
    n.start(0).unwrap();
    n.transport_mut().push(GossipMessage::new(
      MsgKind::JoinRequest,
      Address::new(3, 0),
      vec![rec(3, 0)],
    ));
    n.tick(1).unwrap();
    assert_eq!(n.state(), NodeState::AwaitingJoin);
    assert_eq!(n.table().unwrap().len(), 1);
    assert_eq!(n.transport().sent.len(), 1);
    assert_eq!(n.transport().sent[0].1.kind, MsgKind::JoinRequest);
    assert!(n.log().0.is_empty());
  }

  #[test]
  fn test_late_join_reply_merged_as_gossip() {
    let mut n = node(1, seeded());
    n.start(0).unwrap();
    n.transport_mut().push(GossipMessage::new(
      MsgKind::JoinReply,
      Address::new(2, 0),
      vec![rec(2, 5)],
    ));
    n.tick(1).unwrap();
    assert_eq!(n.state(), NodeState::InGroup);
    assert_eq!(n.table().unwrap().get(2).map(|r| r.heartbeat), Some(5));
    assert!(n.transport().sent.iter().all(|(_, m)| m.kind == MsgKind::Ping));
    assert_eq!(n.log().0, vec![MembershipEvent::Added(Address::new(2, 0))]);
  }

  #[test]
  fn test_garbage_is_dropped() {
    let mut n = node(1, seeded());
    n.start(0).unwrap();
    n.transport_mut().inbox.push_back(vec![]);
    n.transport_mut().inbox.push_back(vec![9, 1, 2]);
    n.tick(1).unwrap();
    assert_eq!(n.state(), NodeState::InGroup);
    assert_eq!(n.table().unwrap().len(), 1);
  }

  #[test]
  fn test_heartbeat_every_round_without_traffic() {
    let mut n = node(1, seeded());
    n.start(0).unwrap();
    for now in 1..=4 {
      n.tick(now).unwrap();
    }
    assert_eq!(n.table().unwrap().own().heartbeat, 4);
    assert_eq!(n.table().unwrap().own().last_seen, 4);
  }

  #[test]
  fn test_heartbeat_on_ping_only() {
    let mut config = seeded();
    config.heartbeat = HeartbeatPolicy::OnPing;
    let mut n = node(1, config);
    n.start(0).unwrap();
    n.tick(1).unwrap();
    n.tick(2).unwrap();
    assert_eq!(n.table().unwrap().own().heartbeat, 0);
    let ping = GossipMessage::new(MsgKind::Ping, Address::new(2, 0), vec![rec(2, 1)]);
    n.transport_mut().push(ping.clone());
    n.transport_mut().push(ping);
    n.tick(3).unwrap();
    assert_eq!(n.table().unwrap().own().heartbeat, 2);
  }

  #[test]
  fn test_crashed_node_is_silent() {
    let mut n = node(1, seeded());
    n.start(0).unwrap();
    n.crash();
    n.transport_mut().push(GossipMessage::new(
      MsgKind::Ping,
      Address::new(2, 0),
      vec![rec(2, 1)],
    ));
    n.tick(1).unwrap();
    assert_eq!(n.state(), NodeState::Failed);
    assert!(n.transport().sent.is_empty());
    assert_eq!(n.transport().inbox.len(), 1);
    assert_eq!(n.table().unwrap().len(), 1);
  }

  #[test]
  fn test_failed_join_stops_node() {
    let mut config = seeded();
    config.join_timeout = 2;
    config.join_attempts = 2;
    let mut n = node(2, config);
    n.start(0).unwrap();
    n.tick(1).unwrap();
    n.tick(2).unwrap();
    n.tick(3).unwrap();
    assert!(matches!(n.tick(4), Err(MembershipError::JoinFailed { .. })));
    assert_eq!(n.state(), NodeState::Failed);
    assert_eq!(n.join_attempts(), 2);
    n.tick(5).unwrap();
  }

  #[test]
  fn test_eviction_is_logged() {
    let mut n = node(1, seeded());
    n.start(0).unwrap();
    n.transport_mut().push(GossipMessage::new(
      MsgKind::Ping,
      Address::new(3, 0),
      vec![rec(3, 1)],
    ));
    n.tick(1).unwrap();
    for now in 2..21 {
      n.tick(now).unwrap();
      assert!(n.table().unwrap().contains(3));
    }
    n.tick(21).unwrap();
    assert!(!n.table().unwrap().contains(3));
    assert_eq!(
      n.log().0,
      vec![
        MembershipEvent::Added(Address::new(3, 0)),
        MembershipEvent::Removed(Address::new(3, 0)),
      ]
    );
  }
}
