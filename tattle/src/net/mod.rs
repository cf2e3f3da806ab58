//! Running a node over a real network.
//!
//! [`UdpTransport`] carries one encoded message per datagram. [`run_node`] supplies the round
//! clock from a tokio interval.

mod runner;
mod udp;

#[rustfmt::skip]
pub use {
  runner::run_node,
  udp::UdpTransport,
};
