use crate::membership::{
  FailureDetector, MemberRecord, MembershipEvent, MembershipTable, Round, SuspicionPolicy,
};
use tracing::trace;

/// Folds gossiped snapshots into a local table.
///
/// The merge is last-writer-wins on the heartbeat: a strictly higher heartbeat replaces the local
/// one and refreshes `last_seen` to the local round. Anything else is dropped. Applying the same
/// snapshot twice leaves heartbeats unchanged, though it may refresh `last_seen` the first time.
#[derive(Clone, Copy, Debug)]
pub struct MergeEngine {
  detector: FailureDetector,
  suspicion: SuspicionPolicy,
}
impl MergeEngine {
  /// Creates an engine that judges suspicion with `detector`.
  pub fn new(detector: FailureDetector, suspicion: SuspicionPolicy) -> MergeEngine {
    MergeEngine {
      detector: detector,
      suspicion: suspicion,
    }
  }

  /// Merges `incoming` into `local` at round `now` and returns the members that were added.
  pub fn merge(
    &self,
    local: &mut MembershipTable,
    incoming: &[MemberRecord],
    now: Round,
  ) -> Vec<MembershipEvent> {
    let mut events = Vec::new();
    let me = local.self_id();
    for r in incoming {
      // Only the owner advances its own heartbeat.
      if r.id == me {
        continue;
      }
      let suspected = match local.get(r.id) {
        None => {
          local.put(MemberRecord::new(&r.address(), r.heartbeat, now));
          events.push(MembershipEvent::Added(r.address()));
          continue;
        }
        Some(l) if l.port != r.port => {
          trace!(id = r.id, local = l.port, incoming = r.port, "port mismatch, dropped");
          continue;
        }
        Some(l) => self.detector.is_suspected(l, now),
      };
      if suspected && self.suspicion == SuspicionPolicy::Strict {
        continue;
      }
      if let Some(l) = local.get_mut(r.id) {
        if r.heartbeat > l.heartbeat {
          if suspected {
            trace!(id = r.id, heartbeat = r.heartbeat, "suspected member revived");
          }
          l.heartbeat = r.heartbeat;
          l.last_seen = now;
        }
      }
    }
    events
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::Address;
  use maplit::btreemap;
  use std::collections::BTreeMap;

  fn rec(id: u32, heartbeat: u64, last_seen: Round) -> MemberRecord {
    MemberRecord::new(&Address::new(id, 0), heartbeat, last_seen)
  }

  fn engine(suspicion: SuspicionPolicy) -> MergeEngine {
    MergeEngine::new(FailureDetector::new(5, 20), suspicion)
  }

  fn state(table: &MembershipTable) -> BTreeMap<u32, (u64, Round)> {
    table.iter().map(|r| (r.id, (r.heartbeat, r.last_seen))).collect()
  }

  #[test]
  fn test_merge() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    local.put(rec(2, 4, 8));
    local.put(rec(3, 7, 8));
    local.put(rec(4, 2, 8));
    let recvd = vec![
      rec(2, 5, 0),
      rec(3, 6, 0),
      rec(4, 2, 0),
      rec(5, 1, 0),
      rec(6, 0, 0),
    ];
    let events = engine(SuspicionPolicy::Revive).merge(&mut local, &recvd, 10);
    let expected = btreemap! {
      1 => (0, 0),
      2 => (5, 10),
      3 => (7, 8),
      4 => (2, 8),
      5 => (1, 10),
      6 => (0, 10),
    };
    assert_eq!(state(&local), expected);
    assert_eq!(
      events,
      vec![
        MembershipEvent::Added(Address::new(5, 0)),
        MembershipEvent::Added(Address::new(6, 0)),
      ]
    );
  }

  #[test]
  fn test_merge_is_idempotent_on_heartbeats() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    local.put(rec(2, 1, 0));
    let recvd = vec![rec(2, 3, 0), rec(3, 2, 0)];
    let e = engine(SuspicionPolicy::Revive);
    e.merge(&mut local, &recvd, 1);
    let once = local.heartbeats();
    assert!(e.merge(&mut local, &recvd, 2).is_empty());
    assert_eq!(local.heartbeats(), once);
    // Nothing improved, so nothing was refreshed.
    assert_eq!(local.get(2).map(|r| r.last_seen), Some(1));
  }

  #[test]
  fn test_merge_never_lowers_heartbeat() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    local.put(rec(2, 9, 3));
    engine(SuspicionPolicy::Revive).merge(&mut local, &[rec(2, 2, 0)], 4);
    assert_eq!(local.get(2).map(|r| (r.heartbeat, r.last_seen)), Some((9, 3)));
  }

  #[test]
  fn test_merge_ignores_own_record() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    engine(SuspicionPolicy::Revive).merge(&mut local, &[rec(1, 50, 0)], 4);
    assert_eq!(*local.own(), rec(1, 0, 0));
  }

  #[test]
  fn test_merge_drops_port_mismatch() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    local.put(rec(2, 1, 0));
    let imposter = MemberRecord::new(&Address::new(2, 99), 10, 0);
    let events = engine(SuspicionPolicy::Revive).merge(&mut local, &[imposter], 1);
    assert!(events.is_empty());
    assert_eq!(*local.get(2).unwrap(), rec(2, 1, 0));
  }

  #[test]
  fn test_revive_refreshes_suspected() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    local.put(rec(2, 1, 0));
    // Idle for 6 rounds: suspected, not yet expired.
    engine(SuspicionPolicy::Revive).merge(&mut local, &[rec(2, 2, 0)], 6);
    assert_eq!(local.get(2).map(|r| (r.heartbeat, r.last_seen)), Some((2, 6)));
  }

  #[test]
  fn test_strict_ignores_suspected() {
    let mut local = MembershipTable::new(Address::new(1, 0), 0);
    local.put(rec(2, 1, 0));
    engine(SuspicionPolicy::Strict).merge(&mut local, &[rec(2, 2, 0)], 6);
    assert_eq!(local.get(2).map(|r| (r.heartbeat, r.last_seen)), Some((1, 0)));
    // Still refreshed while alive.
    let mut fresh = MembershipTable::new(Address::new(1, 0), 0);
    fresh.put(rec(2, 1, 2));
    engine(SuspicionPolicy::Strict).merge(&mut fresh, &[rec(2, 2, 0)], 6);
    assert_eq!(fresh.get(2).map(|r| (r.heartbeat, r.last_seen)), Some((2, 6)));
  }
}
