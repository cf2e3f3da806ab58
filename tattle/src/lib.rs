#![warn(missing_docs)]

//! This crate implements gossip-based group membership. Every node keeps a local table of the
//! members it believes are alive, advances its own heartbeat once per round, and pushes its view
//! to randomly chosen peers. Members that have not been heard from for a configurable number of
//! rounds are first suspected, then evicted.
//!
//! The protocol core in [`membership`] is synchronous and driven by an external round clock. The
//! [`testkit`] module emulates a lossy network and a whole group of nodes, and [`net`] runs a
//! node over UDP.

pub mod core;
pub mod membership;
pub mod net;
pub mod testkit;
