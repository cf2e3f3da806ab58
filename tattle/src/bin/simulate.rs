//! Runs a whole group on an emulated network and prints what every node ended up seeing.
//!
//! ```text
//! simulate [nodes] [rounds] [drop-prob] [crash-round] [seed]
//! ```
//!
//! Defaults to 10 nodes for 100 rounds on a reliable network. When `crash-round` is given, the
//! node with the highest id crashes at that round.

use itertools::Itertools;
use std::env::args;
use std::error::Error;
use tattle::core::Address;
use tattle::membership::{MembershipConfig, MembershipEvent, Round};
use tattle::testkit::{init_tracing, FailureConfigMap, Simulation};
use tracing::warn;

fn arg<T: std::str::FromStr>(args: &[String], idx: usize, default: T) -> Result<T, String>
where
  T::Err: std::fmt::Display,
{
  match args.get(idx) {
    Some(s) => s.parse().map_err(|e| format!("argument {} ({}): {}", idx + 1, s, e)),
    None => Ok(default),
  }
}

fn main() -> Result<(), Box<dyn Error>> {
  init_tracing("warn");
  let args = args().skip(1).collect::<Vec<_>>();
  let nodes: u32 = arg(&args, 0, 10)?;
  let rounds: Round = arg(&args, 1, 100)?;
  let drop_prob: f64 = arg(&args, 2, 0.0)?;
  let crash_round: Option<Round> = args.get(3).map(|s| s.parse()).transpose()?;
  let seed: u64 = arg(&args, 4, 0)?;

  let mut sim = Simulation::new(
    MembershipConfig::default(),
    FailureConfigMap::lossy(drop_prob),
    seed,
  );
  sim.spawn_all(nodes)?;
  let victim = Address::new(nodes, 0);
  while sim.now() < rounds {
    if crash_round == Some(sim.now()) {
      sim.crash(&victim);
    }
    for (addr, e) in sim.run_round() {
      warn!(node = %addr, error = %e, "node failed");
    }
  }

  println!("after {} rounds:", sim.now());
  for (addr, view) in sim.views() {
    println!("  {} sees [{}]", addr, view.iter().join(", "));
  }
  let events = sim.log().events();
  let added = events
    .iter()
    .filter(|(_, e)| matches!(e, MembershipEvent::Added(_)))
    .count();
  println!("added: {}, removed: {}", added, events.len() - added);
  if crash_round.is_some() {
    println!(
      "{} was removed by {} of {} nodes",
      victim,
      sim.log().count(&MembershipEvent::Removed(victim)),
      sim.running().len()
    );
  }
  println!("converged: {}", sim.converged());
  Ok(())
}
