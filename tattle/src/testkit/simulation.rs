use crate::core::{Address, MembershipError, Result};
use crate::membership::{MembershipConfig, NodeController, NodeState, Round};
use crate::testkit::{EmulEndpoint, EmulNet, FailureConfigMap, RecordingLog};
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Inbox bound of every emulated node.
pub const INBOX_CAPACITY: usize = 4096;

/// A node as run by a [`Simulation`].
pub type SimNode = NodeController<EmulEndpoint, RecordingLog>;

/// A group of nodes on one [`EmulNet`], driven by a single round clock.
///
/// Each [`run_round`](Simulation::run_round) ticks every node once, highest address first, then
/// delivers what was sent during the round so it can be read in the next one.
pub struct Simulation {
  now: Round,
  seed: u64,
  config: MembershipConfig,
  net: EmulNet,
  log: RecordingLog,
  nodes: BTreeMap<Address, SimNode>,
}
impl Simulation {
  /// Creates an empty simulation at round 0. `seed` drives the network and every node's peer
  /// selection.
  pub fn new(config: MembershipConfig, fail_map: FailureConfigMap, seed: u64) -> Simulation {
    Simulation {
      now: 0,
      seed: seed,
      config: config,
      net: EmulNet::new(fail_map, INBOX_CAPACITY, seed),
      log: RecordingLog::new(),
      nodes: BTreeMap::new(),
    }
  }

  /// The round the next [`run_round`](Simulation::run_round) executes.
  pub fn now(&self) -> Round {
    self.now
  }

  /// Starts a node at `addr` in the current round. The node's peer selection is seeded from the
  /// simulation seed and its id.
  pub fn spawn(&mut self, addr: Address) -> Result<()> {
    let mut config = self.config.clone();
    config.rng_seed = Some(self.seed.wrapping_mul(31).wrapping_add(addr.id() as u64));
    let endpoint = self.net.attach(addr);
    let log = self.log.clone();
    let node = self
      .nodes
      .entry(addr)
      .or_insert_with(|| NodeController::new(addr, config, endpoint, log));
    debug!(node = %addr, round = self.now, "spawning");
    node.start(self.now)
  }

  /// Starts `count` nodes with ids `1..=count` on port 0.
  pub fn spawn_all(&mut self, count: u32) -> Result<()> {
    for id in 1..=count {
      self.spawn(Address::new(id, 0))?;
    }
    Ok(())
  }

  /// Crashes the node at `addr` and cuts it off the network. Returns false if there is no such
  /// node.
  pub fn crash(&mut self, addr: &Address) -> bool {
    match self.nodes.get_mut(addr) {
      Some(node) => {
        info!(node = %addr, round = self.now, "crashing node");
        node.crash();
        self.net.detach(addr);
        true
      }
      None => false,
    }
  }

  /// Runs one round. Returns the nodes that failed during it.
  pub fn run_round(&mut self) -> Vec<(Address, MembershipError)> {
    let now = self.now;
    let failures = self
      .nodes
      .iter_mut()
      .rev()
      .filter_map(|(addr, node)| node.tick(now).err().map(|e| (*addr, e)))
      .collect::<Vec<_>>();
    self.now += 1;
    self.net.deliver(self.now);
    failures
  }

  /// Runs `rounds` rounds, collecting every failure.
  pub fn run(&mut self, rounds: Round) -> Vec<(Address, MembershipError)> {
    (0..rounds).flat_map(|_| self.run_round()).collect()
  }

  /// The node at `addr`, crashed or not.
  pub fn node(&self, addr: &Address) -> Option<&SimNode> {
    self.nodes.get(addr)
  }

  /// Every node ever spawned, in address order.
  pub fn nodes(&self) -> impl Iterator<Item = &SimNode> {
    self.nodes.values()
  }

  /// Addresses of nodes still taking part in the protocol.
  pub fn running(&self) -> Vec<Address> {
    self
      .nodes
      .values()
      .filter(|n| n.is_running())
      .map(|n| *n.address())
      .collect()
  }

  /// The event log shared by all nodes.
  pub fn log(&self) -> &RecordingLog {
    &self.log
  }

  /// The emulated network.
  pub fn net(&self) -> &EmulNet {
    &self.net
  }

  /// Each running node's sorted member list.
  pub fn views(&self) -> BTreeMap<Address, Vec<Address>> {
    self
      .nodes
      .values()
      .filter(|n| n.is_running())
      .filter_map(|n| {
        let table = n.table()?;
        Some((*n.address(), table.addresses().into_iter().sorted().collect()))
      })
      .collect()
  }

  /// True when every node is in the group and each one's table lists exactly the running nodes.
  pub fn converged(&self) -> bool {
    let running = self.running();
    self.nodes.values().all(|n| n.state() != NodeState::AwaitingJoin)
      && self.views().values().all(|view| *view == running)
  }

  /// Runs until [`converged`](Simulation::converged), for at most `limit` rounds. Returns the
  /// number of rounds run, or `None` if the group never converged.
  pub fn run_until_converged(&mut self, limit: Round) -> Option<Round> {
    for rounds in 0..limit {
      if self.converged() {
        return Some(rounds);
      }
      for (addr, e) in self.run_round() {
        debug!(node = %addr, error = %e, "node failed");
      }
    }
    if self.converged() {
      Some(limit)
    } else {
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_two_nodes_join_in_two_rounds() {
    let mut sim = Simulation::new(MembershipConfig::default(), FailureConfigMap::default(), 7);
    sim.spawn_all(2).unwrap();
    assert_eq!(sim.node(&Address::new(2, 0)).unwrap().state(), NodeState::AwaitingJoin);
    assert!(sim.run(1).is_empty());
    assert_eq!(sim.node(&Address::new(2, 0)).unwrap().state(), NodeState::AwaitingJoin);
    assert!(sim.run(2).is_empty());
    assert_eq!(sim.node(&Address::new(2, 0)).unwrap().state(), NodeState::InGroup);
    assert!(sim.converged());
  }

  #[test]
  fn test_crash_unknown_node() {
    let mut sim = Simulation::new(MembershipConfig::default(), FailureConfigMap::default(), 7);
    assert!(!sim.crash(&Address::new(9, 0)));
  }

  #[test]
  fn test_spawn_twice_is_rejected() {
    let mut sim = Simulation::new(MembershipConfig::default(), FailureConfigMap::default(), 7);
    sim.spawn(Address::new(1, 0)).unwrap();
    assert!(matches!(
      sim.spawn(Address::new(1, 0)),
      Err(MembershipError::AlreadyStarted { .. })
    ));
  }
}
