//! Runs one member over UDP.
//!
//! ```text
//! tattle-node <bind-ip:port> [introducer-ip:port]
//! ```
//!
//! Without an introducer the node founds a group of its own. Member ids are IPv4 addresses, so
//! every member of a group needs its own IP. Settings are read from `TATTLE_FAIL_THRESHOLD`,
//! `TATTLE_REMOVE_THRESHOLD`, `TATTLE_FANOUT`, `TATTLE_SEED` and `TATTLE_ROUND_MS`; logging is
//! filtered by `RUST_LOG`.

use std::env::{args, var};
use std::error::Error;
use std::net::SocketAddrV4;
use std::str::FromStr;
use std::time::Duration;
use tattle::core::{Address, TracingLog};
use tattle::membership::{MembershipConfig, NodeController};
use tattle::net::{run_node, UdpTransport};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ROUND_MS: u64 = 1000;

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, String>
where
  T::Err: std::fmt::Display,
{
  match var(key) {
    Ok(val) => val.parse().map_err(|e| format!("{}={}: {}", key, val, e)),
    Err(_) => Ok(default),
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut args = args().skip(1);
  let usage = "usage: tattle-node <bind-ip:port> [introducer-ip:port]";
  let bind = args.next().ok_or(usage)?.parse::<SocketAddrV4>()?;
  let introducer = args.next().map(|s| s.parse::<SocketAddrV4>()).transpose()?;

  let transport = UdpTransport::bind(bind).await?;
  let me = *transport.address();
  let defaults = MembershipConfig::default();
  let config = MembershipConfig {
    fail_threshold: env_or("TATTLE_FAIL_THRESHOLD", defaults.fail_threshold)?,
    remove_threshold: env_or("TATTLE_REMOVE_THRESHOLD", defaults.remove_threshold)?,
    fanout: env_or("TATTLE_FANOUT", defaults.fanout)?,
    introducer: introducer.map_or(me, Address::from),
    rng_seed: var("TATTLE_SEED").ok().map(|s| s.parse()).transpose()?,
    ..defaults
  };
  let period = Duration::from_millis(env_or("TATTLE_ROUND_MS", DEFAULT_ROUND_MS)?);
  info!(node = %me, introducer = %config.introducer, ?period, "starting node");

  let node = NodeController::new(me, config, transport, TracingLog);
  let shutdown = async {
    if tokio::signal::ctrl_c().await.is_err() {
      std::future::pending::<()>().await;
    }
  };
  let node = run_node(node, period, shutdown).await?;
  info!(
    node = %me,
    members = node.table().map_or(0, |t| t.len()),
    "stopped"
  );
  Ok(())
}
