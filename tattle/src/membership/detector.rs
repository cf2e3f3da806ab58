use crate::membership::{MemberRecord, MembershipEvent, MembershipTable, Round};
use tracing::debug;

/// How a node currently classifies one of its members.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Liveness {
  /// Heard from within the last `fail_threshold` rounds.
  Alive,
  /// Not heard from for `fail_threshold` rounds. Kept, but not gossiped.
  Suspected,
  /// Not heard from for `remove_threshold` rounds. Due for eviction.
  Expired,
}

/// Round-counted, two-threshold failure detection.
#[derive(Clone, Copy, Debug)]
pub struct FailureDetector {
  fail_threshold: Round,
  remove_threshold: Round,
}
impl FailureDetector {
  /// `fail_threshold` must be below `remove_threshold`;
  /// [`MembershipConfig`](crate::membership::MembershipConfig) validation enforces this.
  pub fn new(fail_threshold: Round, remove_threshold: Round) -> FailureDetector {
    FailureDetector {
      fail_threshold: fail_threshold,
      remove_threshold: remove_threshold,
    }
  }

  /// Classifies `record` by how long it has gone unrefreshed as of round `now`.
  pub fn classify(&self, record: &MemberRecord, now: Round) -> Liveness {
    let idle = record.idle(now);
    if idle >= self.remove_threshold {
      Liveness::Expired
    } else if idle >= self.fail_threshold {
      Liveness::Suspected
    } else {
      Liveness::Alive
    }
  }

  /// Suspected or worse.
  pub fn is_suspected(&self, record: &MemberRecord, now: Round) -> bool {
    self.classify(record, now) != Liveness::Alive
  }

  /// The records worth gossiping: everything not suspected, plus the owner's own record, which its
  /// owner never suspects.
  pub fn snapshot(&self, table: &MembershipTable, now: Round) -> Vec<MemberRecord> {
    let me = table.self_id();
    table
      .iter()
      .filter(|r| r.id == me || !self.is_suspected(r, now))
      .copied()
      .collect()
  }

  /// Evicts every expired member except the owner and reports the evictions.
  pub fn detect(&self, table: &mut MembershipTable, now: Round) -> Vec<MembershipEvent> {
    let me = table.self_id();
    let expired = table
      .iter()
      .filter(|r| r.id != me && self.classify(r, now) == Liveness::Expired)
      .map(|r| r.id)
      .collect::<Vec<_>>();
    let mut events = Vec::with_capacity(expired.len());
    for id in expired {
      if let Some(record) = table.remove(id) {
        debug!(
          observer = %table.self_address(),
          member = %record.address(),
          idle = record.idle(now),
          "evicting member"
        );
        events.push(MembershipEvent::Removed(record.address()));
      }
    }
    events
  }
}
