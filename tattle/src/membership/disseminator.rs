use crate::core::{Address, GossipMessage, MsgKind, Transport};
use crate::membership::{FailureDetector, MembershipTable, Round};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use tracing::{trace, warn};

/// Pushes the local view to randomly chosen members.
pub struct GossipDisseminator {
  fanout: usize,
  rng: SmallRng,
}
impl GossipDisseminator {
  /// Creates a disseminator sending `fanout` pings a round. `None` seeds from entropy.
  pub fn new(fanout: usize, seed: Option<u64>) -> GossipDisseminator {
    GossipDisseminator {
      fanout: fanout,
      rng: seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64),
    }
  }

  /// Pings sent per round.
  pub fn fanout(&self) -> usize {
    self.fanout
  }

  /// Draws `fanout` targets uniformly, with replacement, from the whole table. The same member
  /// may come up more than once, and so may the owner: a ping to oneself costs a message but
  /// keeps the draw uniform over the table.
  pub fn select_targets(&mut self, table: &MembershipTable) -> SmallVec<[Address; 4]> {
    let len = table.len();
    if len == 0 {
      return SmallVec::new();
    }
    (0..self.fanout)
      .filter_map(|_| table.nth(self.rng.gen_range(0..len)).map(|r| r.address()))
      .collect()
  }

  /// Sends one round of pings carrying the unsuspected part of `table`. Returns the number of
  /// pings the transport accepted. Nothing is retried: the next round draws new targets.
  pub fn disseminate<T: Transport + ?Sized>(
    &mut self,
    table: &MembershipTable,
    detector: &FailureDetector,
    now: Round,
    transport: &mut T,
  ) -> usize {
    let me = *table.self_address();
    let msg = GossipMessage::new(MsgKind::Ping, me, detector.snapshot(table, now));
    let payload = match msg.encode() {
      Ok(payload) => payload,
      Err(e) => {
        warn!(node = %me, error = %e, "failed to encode ping");
        return 0;
      }
    };
    let mut sent = 0;
    for target in self.select_targets(table) {
      match transport.send(&target, payload.clone()) {
        Ok(()) => sent += 1,
        Err(e) => trace!(node = %me, %target, error = %e, "ping not sent"),
      }
    }
    sent
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::TransportError;
  use crate::membership::MemberRecord;
  use itertools::Itertools;

  #[derive(Default)]
  struct Outbox(Vec<(Address, GossipMessage)>);
  impl Transport for Outbox {
    fn send(&mut self, to: &Address, payload: Vec<u8>) -> Result<(), TransportError> {
      self.0.push((*to, GossipMessage::decode(&payload).unwrap()));
      Ok(())
    }

    fn receive(&mut self) -> Vec<Vec<u8>> {
      vec![]
    }
  }

  fn table(peers: &[(u32, Round)]) -> MembershipTable {
    let mut table = MembershipTable::new(Address::new(1, 0), 0);
    for (id, seen) in peers {
      table.put(MemberRecord::new(&Address::new(*id, 0), 0, *seen));
    }
    table
  }

  #[test]
  fn test_fanout_draws_with_replacement() {
    // Fanout 3 with two other members still produces three pings.
    let table = table(&[(2, 0), (3, 0)]);
    let mut gd = GossipDisseminator::new(3, Some(7));
    let mut out = Outbox::default();
    let sent = gd.disseminate(&table, &FailureDetector::new(5, 20), 1, &mut out);
    assert_eq!(sent, 3);
    assert_eq!(out.0.len(), 3);
    assert!(out.0.iter().all(|(to, _)| table.contains(to.id())));
  }

  #[test]
  fn test_selection_covers_whole_table() {
    let table = table(&[(2, 0), (3, 0)]);
    let mut gd = GossipDisseminator::new(64, Some(11));
    let picked = gd
      .select_targets(&table)
      .into_iter()
      .map(|a| a.id())
      .unique()
      .sorted()
      .collect_vec();
    assert_eq!(picked, vec![1, 2, 3]);
  }

  #[test]
  fn test_pings_hide_suspects() {
    let table = table(&[(2, 9), (3, 0)]);
    let mut gd = GossipDisseminator::new(2, Some(3));
    let mut out = Outbox::default();
    gd.disseminate(&table, &FailureDetector::new(5, 20), 10, &mut out);
    for (_, msg) in out.0 {
      assert_eq!(msg.kind, MsgKind::Ping);
      assert_eq!(msg.sender, Address::new(1, 0));
      assert_eq!(msg.snapshot.iter().map(|r| r.id).collect_vec(), vec![1, 2]);
    }
  }

  #[test]
  fn test_seeded_selection_is_reproducible() {
    let table = table(&[(2, 0), (3, 0), (4, 0), (5, 0)]);
    let a = GossipDisseminator::new(8, Some(42)).select_targets(&table);
    let b = GossipDisseminator::new(8, Some(42)).select_targets(&table);
    assert_eq!(a, b);
  }
}
