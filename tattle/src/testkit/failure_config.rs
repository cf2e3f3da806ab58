use crate::core::Address;
use crate::membership::Round;
use im::HashMap;
use serde::{Deserialize, Serialize};

/// How unreliable delivery to one destination is.
#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FailureConfig {
  /// Probability in `[0, 1]` that a message is lost.
  pub drop_prob: f64,
  /// Extra rounds a message spends in flight, drawn uniformly from the inclusive range. Delayed
  /// messages can overtake each other.
  pub delay: Option<(Round, Round)>,
}

/// Failure settings for a whole emulated network, with per-destination overrides.
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct FailureConfigMap {
  /// Settings for destinations without an override.
  pub cluster_wide: FailureConfig,
  /// Per-destination overrides.
  pub node_wide: HashMap<Address, FailureConfig>,
}
impl FailureConfigMap {
  /// The settings for messages sent to `addr`.
  pub fn get(&self, addr: &Address) -> &FailureConfig {
    self.node_wide.get(addr).unwrap_or(&self.cluster_wide)
  }

  /// Drops every message with probability `drop_prob`.
  pub fn lossy(drop_prob: f64) -> FailureConfigMap {
    FailureConfigMap {
      cluster_wide: FailureConfig {
        drop_prob: drop_prob,
        delay: None,
      },
      node_wide: HashMap::new(),
    }
  }
}

#[test]
fn test_node_wide_overrides_cluster_wide() {
  let mut map = FailureConfigMap::lossy(0.1);
  let cut_off = FailureConfig {
    drop_prob: 1.0,
    delay: None,
  };
  map.node_wide.insert(Address::new(3, 0), cut_off);
  assert_eq!(map.get(&Address::new(3, 0)).drop_prob, 1.0);
  assert_eq!(map.get(&Address::new(2, 0)).drop_prob, 0.1);
}
