use std::collections::BTreeMap;
use tattle::core::Address;
use tattle::membership::{MembershipConfig, MembershipEvent, NodeState};
use tattle::testkit::{init_tracing, FailureConfigMap, Simulation};

fn addr(id: u32) -> Address {
  Address::new(id, 0)
}

fn converged_group(nodes: u32, seed: u64, fail_map: FailureConfigMap) -> Simulation {
  init_tracing("warn");
  let mut sim = Simulation::new(MembershipConfig::default(), fail_map, seed);
  sim.spawn_all(nodes).unwrap();
  assert!(sim.run_until_converged(100).is_some());
  sim
}

#[test]
fn crash_is_detected_by_every_peer() {
  let mut sim = converged_group(3, 11, FailureConfigMap::default());
  let z = addr(3);
  assert!(sim.crash(&z));
  assert_eq!(sim.node(&z).unwrap().state(), NodeState::Failed);
  sim.run(25);
  for (node, view) in sim.views() {
    assert_eq!(view, vec![addr(1), addr(2)], "view of {}", node);
  }
  assert_eq!(sim.log().removed_by(&addr(1)), vec![z]);
  assert_eq!(sim.log().removed_by(&addr(2)), vec![z]);
  assert!(sim.log().removed_by(&z).is_empty());
  // Nobody re-learns about the crashed node from stale gossip.
  sim.run(50);
  assert_eq!(sim.log().count(&MembershipEvent::Removed(z)), 2);
  assert_eq!(sim.log().count(&MembershipEvent::Added(z)), 2);
}

#[test]
fn crash_eviction_waits_for_remove_threshold() {
  let mut sim = converged_group(4, 12, FailureConfigMap::default());
  let remove_threshold = MembershipConfig::default().remove_threshold;
  sim.crash(&addr(4));
  let mut last_seen = BTreeMap::new();
  let mut evicted_at = BTreeMap::new();
  for _ in 0..30 {
    let now = sim.now();
    sim.run_round();
    for id in 1..=3 {
      match sim.node(&addr(id)).unwrap().table().unwrap().get(4) {
        Some(record) => {
          last_seen.insert(id, record.last_seen);
        }
        None => {
          evicted_at.entry(id).or_insert(now);
        }
      }
    }
  }
  assert_eq!(evicted_at.len(), 3);
  for (id, round) in evicted_at {
    assert!(round - last_seen[&id] >= remove_threshold, "node {} evicted early", id);
  }
}

#[test]
fn crashed_member_is_suspected_before_eviction() {
  let mut sim = converged_group(3, 13, FailureConfigMap::default());
  let config = MembershipConfig::default();
  sim.crash(&addr(3));
  sim.run(config.fail_threshold + 3);
  let now = sim.now();
  for id in 1..=2 {
    let node = sim.node(&addr(id)).unwrap();
    let table = node.table().unwrap();
    let record = table.get(3).unwrap();
    assert!(node.detector().is_suspected(record, now));
    assert!(node.detector().snapshot(table, now).iter().all(|r| r.id != 3));
  }
}

#[test]
fn crash_is_detected_on_lossy_network() {
  let mut sim = converged_group(5, 14, FailureConfigMap::lossy(0.1));
  sim.crash(&addr(5));
  sim.run(40);
  for id in 1..=4 {
    assert_eq!(sim.log().removed_by(&addr(id)), vec![addr(5)]);
  }
  for view in sim.views().values() {
    assert_eq!(*view, (1..=4).map(addr).collect::<Vec<_>>());
  }
}
