//! Tools for running many nodes in one process: an emulated lossy network, a shared event log and
//! a round-driven [`Simulation`].

mod emulnet;
mod failure_config;
mod logging;
mod simulation;

#[rustfmt::skip]
pub use {
  emulnet::EmulEndpoint,
  emulnet::EmulNet,
  emulnet::NetStats,
  failure_config::FailureConfig,
  failure_config::FailureConfigMap,
  logging::init_tracing,
  logging::RecordingLog,
  simulation::SimNode,
  simulation::Simulation,
  simulation::INBOX_CAPACITY,
};
