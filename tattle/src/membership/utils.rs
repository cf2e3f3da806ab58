use crate::core::Address;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Configures a [`NodeController`](crate::membership::NodeController). All durations are counted
/// in rounds of the external clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_config"))]
pub struct MembershipConfig {
  /// The number of rounds a member may go unheard from before it is suspected. Suspected members
  /// stay in the table but are no longer gossiped.
  ///
  /// default: `5`
  pub fail_threshold: u64,
  /// The number of rounds a member may go unheard from before it is evicted. Must be greater
  /// than [`fail_threshold`](#structfield.fail_threshold).
  ///
  /// default: `20`
  pub remove_threshold: u64,
  /// The number of pings sent each round. Targets are drawn with replacement.
  ///
  /// default: `3`
  pub fanout: usize,
  /// The node every other node contacts to join the group. The node at this address starts the
  /// group itself.
  ///
  /// default: `1:0`
  pub introducer: Address,
  /// When a node advances its own heartbeat.
  ///
  /// default: [`HeartbeatPolicy::EveryRound`]
  pub heartbeat: HeartbeatPolicy,
  /// Whether fresher gossip may refresh a member that is already suspected.
  ///
  /// default: [`SuspicionPolicy::Revive`]
  pub suspicion: SuspicionPolicy,
  /// The number of rounds a node waits for a join reply before it asks again.
  ///
  /// default: `10`
  pub join_timeout: u64,
  /// The maximum number of join requests a node sends before giving up.
  ///
  /// default: `3`
  pub join_attempts: usize,
  /// Seeds peer selection. `None` seeds from entropy.
  ///
  /// default: `None`
  pub rng_seed: Option<u64>,
}
impl Default for MembershipConfig {
  #[inline]
  fn default() -> Self {
    MembershipConfig {
      fail_threshold: 5,
      remove_threshold: 20,
      fanout: 3,
      introducer: Address::new(1, 0),
      heartbeat: HeartbeatPolicy::EveryRound,
      suspicion: SuspicionPolicy::Revive,
      join_timeout: 10,
      join_attempts: 3,
      rng_seed: None,
    }
  }
}

fn validate_config(cfg: &MembershipConfig) -> Result<(), ValidationError> {
  if cfg.fail_threshold == 0 {
    return Err(ValidationError::new("fail_threshold_zero"));
  }
  if cfg.fail_threshold >= cfg.remove_threshold {
    return Err(ValidationError::new("fail_threshold_not_below_remove_threshold"));
  }
  if cfg.fanout == 0 {
    return Err(ValidationError::new("fanout_zero"));
  }
  if cfg.join_timeout == 0 || cfg.join_attempts == 0 {
    return Err(ValidationError::new("join_never_attempted"));
  }
  Ok(())
}

/// When a node advances its own heartbeat.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HeartbeatPolicy {
  /// Once per round spent in the group, whether or not anything was received.
  EveryRound,
  /// Once per ping handled. A node that receives no pings in a round does not advance, so a
  /// quiet node can be suspected by its peers even though it is alive.
  OnPing,
}

/// How gossip about a suspected member is treated.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SuspicionPolicy {
  /// A strictly higher heartbeat refreshes a suspected member.
  Revive,
  /// Suspected members are never refreshed. They are evicted, and may be re-added by later
  /// gossip as if they were new.
  Strict,
}

/// A change a node made to its membership table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum MembershipEvent {
  /// The member was not in the table and now is.
  Added(Address),
  /// The member was evicted.
  Removed(Address),
}
impl MembershipEvent {
  /// The member this event is about.
  pub fn member(&self) -> &Address {
    match self {
      MembershipEvent::Added(a) | MembershipEvent::Removed(a) => a,
    }
  }
}

#[test]
fn test_default_config_is_valid() {
  assert!(MembershipConfig::default().validate().is_ok());
}

#[test]
fn test_config_rejects_inverted_thresholds() {
  let mut cfg = MembershipConfig::default();
  cfg.fail_threshold = 20;
  cfg.remove_threshold = 20;
  assert!(cfg.validate().is_err());
  cfg.fail_threshold = 0;
  assert!(cfg.validate().is_err());
}

#[test]
fn test_config_rejects_zero_fanout() {
  let mut cfg = MembershipConfig::default();
  cfg.fanout = 0;
  assert!(cfg.validate().is_err());
}
