use crate::core::Address;
use crate::membership::NodeState;
use thiserror::Error;

/// Result type for membership operations.
pub type Result<T> = std::result::Result<T, MembershipError>;

/// Errors that stop a node. Lost, stale or malformed gossip is never reported through this type;
/// it is dropped where it is found.
#[derive(Debug, Error)]
pub enum MembershipError {
  /// The configuration handed to a node failed validation.
  #[error("invalid configuration: {0}")]
  InvalidConfig(#[from] validator::ValidationErrors),

  /// Local bootstrap was attempted from a state other than
  /// [`Uninitialized`](NodeState::Uninitialized).
  #[error("node {addr} cannot start from state {state:?}")]
  AlreadyStarted {
    /// The node that was started twice.
    addr: Address,
    /// The state it was in.
    state: NodeState,
  },

  /// The join handshake never completed.
  #[error("node {addr} failed to join via {introducer} after {attempts} attempt(s)")]
  JoinFailed {
    /// The node that gave up.
    addr: Address,
    /// The introducer that never answered.
    introducer: Address,
    /// Join requests sent.
    attempts: usize,
  },

  /// The transport refused a message that had to be delivered.
  #[error("transport error: {0}")]
  Transport(#[from] TransportError),

  /// A message could not be encoded.
  #[error("codec error: {0}")]
  Codec(#[from] CodecError),
}

/// Errors raised by a [`Transport`](crate::core::Transport) when a send is refused outright.
/// Messages silently lost in flight never produce one.
#[derive(Debug, Error)]
pub enum TransportError {
  /// The destination's inbox is full.
  #[error("inbox of {0} is full")]
  InboxFull(Address),

  /// The sender is not attached to the network.
  #[error("{0} is not attached to the network")]
  Detached(Address),

  /// The underlying socket failed.
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors raised while turning a [`GossipMessage`](crate::core::GossipMessage) into bytes or
/// back.
#[derive(Debug, Error)]
pub enum CodecError {
  /// Zero length payload.
  #[error("empty payload")]
  Empty,

  /// The leading kind byte is not a known message kind.
  #[error("unknown message kind {0}")]
  UnknownKind(u8),

  /// The encoded message would not fit in a single datagram.
  #[error("payload of {0} bytes exceeds the maximum of {max}", max = crate::core::MAX_PAYLOAD)]
  Oversized(usize),

  /// The body failed to (de)serialize.
  #[error("cbor: {0}")]
  Cbor(#[from] serde_cbor::Error),
}
