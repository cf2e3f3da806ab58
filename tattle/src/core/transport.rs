use crate::core::{Address, TransportError};

/// Moves opaque payloads between members.
///
/// Delivery is best-effort: payloads may be dropped or reordered across sends, but a transport
/// must not duplicate them. [`receive`](Transport::receive) never blocks, it returns whatever
/// arrived since the last call, in arrival order.
pub trait Transport {
  /// Hands a payload to the network. An `Err` means the payload was refused outright; a payload
  /// lost in flight still returns `Ok`.
  fn send(&mut self, to: &Address, payload: Vec<u8>) -> Result<(), TransportError>;

  /// Drains the local inbox.
  fn receive(&mut self) -> Vec<Vec<u8>>;
}
impl<T: Transport + ?Sized> Transport for Box<T> {
  fn send(&mut self, to: &Address, payload: Vec<u8>) -> Result<(), TransportError> {
    (**self).send(to, payload)
  }

  fn receive(&mut self) -> Vec<Vec<u8>> {
    (**self).receive()
  }
}
