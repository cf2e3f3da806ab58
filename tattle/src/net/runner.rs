use crate::core::{EventLog, Result, Transport};
use crate::membership::{NodeController, NodeState, Round};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Drives `node` in real time, one round per `period`, until `shutdown` completes or the node
/// fails. The round clock starts at 0, where the node is started if it has not been already.
///
/// Returns the node on shutdown, or the error that made it fail.
pub async fn run_node<T, L, S>(
  mut node: NodeController<T, L>,
  period: Duration,
  shutdown: S,
) -> Result<NodeController<T, L>>
where
  T: Transport,
  L: EventLog,
  S: Future<Output = ()>,
{
  let mut now: Round = 0;
  if node.state() == NodeState::Uninitialized {
    node.start(now)?;
  }
  let mut ticker = interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  ticker.tick().await;
  tokio::pin!(shutdown);
  loop {
    tokio::select! {
      _ = &mut shutdown => {
        info!(node = %node.address(), round = now, "shutting down");
        return Ok(node);
      }
      _ = ticker.tick() => {
        now += 1;
        node.tick(now)?;
      }
    }
  }
}
