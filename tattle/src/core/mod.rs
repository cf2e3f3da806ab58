//! The boundary between the protocol and the outside world: member [`Address`]es, the
//! [`GossipMessage`] codec, and the [`Transport`] and [`EventLog`] collaborators a node is driven
//! with.
//!
//! ### Addresses
//! An [`Address`] decodes to an `(id, port)` [`Identity`] and back. Membership tables are keyed by
//! the id, so ids must be unique within a group. For UDP deployments the id is the IPv4 address
//! of the member.
//!
//! ```ignore
//! let addr = Address::new(1, 0);
//! assert_eq!(addr.identity(), (1, 0));
//! assert_eq!(addr.to_string(), "1:0");
//! ```
//!
//! ### Messages
//! Payloads are opaque to the transport. They start with a [`MsgKind`] byte and carry a CBOR body
//! holding the sender and its snapshot.
//!
//! ```ignore
//! let bytes = GossipMessage::new(MsgKind::Ping, me, snapshot).encode()?;
//! transport.send(&peer, bytes)?;
//! ```

mod address;
mod error;
mod event_log;
mod message;
mod transport;

#[rustfmt::skip]
pub use {
  address::Address,
  address::Identity,
  address::ParseAddressError,
  error::CodecError,
  error::MembershipError,
  error::Result,
  error::TransportError,
  event_log::EventLog,
  event_log::TracingLog,
  message::GossipMessage,
  message::MsgKind,
  message::MAX_PAYLOAD,
  transport::Transport,
};
