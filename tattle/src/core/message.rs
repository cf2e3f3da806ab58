use crate::core::{Address, CodecError};
use crate::membership::MemberRecord;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// The largest payload a single UDP datagram can carry.
pub const MAX_PAYLOAD: usize = 65507;

/// The kind of a [`GossipMessage`]. Encoded as the first byte of every payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MsgKind {
  /// Sent to the introducer by a node that wants to join the group.
  JoinRequest = 0,
  /// The introducer's answer to a [`JoinRequest`](MsgKind::JoinRequest).
  JoinReply = 1,
  /// Periodic, unacknowledged gossip.
  Ping = 2,
}

#[derive(Serialize, Deserialize)]
struct Body {
  sender: Address,
  snapshot: Vec<MemberRecord>,
}

/// A message exchanged between members. The snapshot is a copy of (part of) the sender's
/// membership table; `last_seen` never travels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GossipMessage {
  /// What the receiver should do with this message.
  pub kind: MsgKind,
  /// Who sent it. Replies go here.
  pub sender: Address,
  /// The sender's view, without the members it suspects.
  pub snapshot: Vec<MemberRecord>,
}
impl GossipMessage {
  /// Creates a new [`GossipMessage`].
  pub fn new(kind: MsgKind, sender: Address, snapshot: Vec<MemberRecord>) -> GossipMessage {
    GossipMessage {
      kind: kind,
      sender: sender,
      snapshot: snapshot,
    }
  }

  /// Encodes this message: one kind byte followed by the CBOR body.
  pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
    let body = Body {
      sender: self.sender,
      snapshot: self.snapshot.clone(),
    };
    let mut buf = vec![u8::from(self.kind)];
    serde_cbor::to_writer(&mut buf, &body)?;
    if buf.len() > MAX_PAYLOAD {
      return Err(CodecError::Oversized(buf.len()));
    }
    Ok(buf)
  }

  /// Decodes a payload produced by [`encode`](GossipMessage::encode).
  pub fn decode(buf: &[u8]) -> Result<GossipMessage, CodecError> {
    let (kind, body) = buf.split_first().ok_or(CodecError::Empty)?;
    let kind = MsgKind::try_from(*kind).map_err(|e| CodecError::UnknownKind(e.number))?;
    let body: Body = serde_cbor::from_slice(body)?;
    Ok(GossipMessage {
      kind: kind,
      sender: body.sender,
      snapshot: body.snapshot,
    })
  }
}
