//! Group membership over gossip.
//!
//! Every node owns a [`MembershipTable`] mapping member ids to a [`MemberRecord`]: the member's
//! heartbeat, and the local round at which that heartbeat last went up. Nodes push copies of their
//! tables to randomly chosen members every round, and fold the copies they receive into their own
//! table with a [`MergeEngine`]. Nothing is ever acknowledged. A lost message is made up for by
//! the next round's gossip.
//!
//! ### Failure Detection
//! A member whose record has not been refreshed for `fail_threshold` rounds is suspected: it stays
//! in the table but is left out of outgoing gossip, so its stale heartbeat stops spreading. After
//! `remove_threshold` rounds it is evicted, and the [`EventLog`](crate::core::EventLog) hears
//! about it. Whether fresher gossip may rescue a suspected member is decided by
//! [`SuspicionPolicy`].
//!
//! ### Joining
//! One node, the introducer, founds the group. Every other node sends it a join request and is
//! answered with the introducer's view. See [`JoinProtocol`].
//!
//! ### Rounds
//! Nothing in this module reads a clock. The current round is passed to every operation, and
//! [`NodeController::tick`] is called once per round by whoever owns the clock: a
//! [`Simulation`](crate::testkit::Simulation) or [`run_node`](crate::net::run_node).

mod controller;
mod detector;
mod disseminator;
mod join;
mod merge;
mod table;
mod utils;

#[rustfmt::skip]
pub use {
  controller::NodeController,
  detector::FailureDetector,
  detector::Liveness,
  disseminator::GossipDisseminator,
  join::JoinProtocol,
  join::NodeState,
  merge::MergeEngine,
  table::MemberRecord,
  table::MembershipTable,
  table::Round,
  utils::HeartbeatPolicy,
  utils::MembershipConfig,
  utils::MembershipEvent,
  utils::SuspicionPolicy,
};
