use crate::core::{Address, Transport, TransportError, MAX_PAYLOAD};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

/// Pause after a transient receive error before reading again.
const RECV_BACKOFF: Duration = Duration::from_millis(10);

/// A [`Transport`] over one UDP socket.
///
/// A background task reads datagrams off the socket into an unbounded channel, which
/// [`receive`](Transport::receive) drains without blocking. [`send`](Transport::send) queues the
/// datagram for a second task that writes it out, so it never waits on the socket; it only fails
/// once that task is gone. Must be created inside a tokio runtime.
pub struct UdpTransport {
  addr: Address,
  outbox: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
  inbox: Receiver<Vec<u8>>,
  receiver: JoinHandle<()>,
  sender: JoinHandle<()>,
}
impl UdpTransport {
  /// Binds `bind`. A port of 0 picks a free one; [`address`](UdpTransport::address) reports it.
  pub async fn bind(bind: SocketAddrV4) -> io::Result<UdpTransport> {
    let socket = Arc::new(UdpSocket::bind(bind).await?);
    let local = match socket.local_addr()? {
      SocketAddr::V4(v4) => v4,
      SocketAddr::V6(v6) => {
        return Err(io::Error::new(
          io::ErrorKind::InvalidInput,
          format!("expected an IPv4 address, bound to {}", v6),
        ))
      }
    };
    let addr = Address::from(local);
    let (in_tx, in_rx) = unbounded();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let receiver = tokio::spawn(udp_receiver(addr, socket.clone(), in_tx));
    let sender = tokio::spawn(udp_sender(addr, socket, out_rx));
    debug!(node = %addr, "udp transport bound");
    Ok(UdpTransport {
      addr: addr,
      outbox: out_tx,
      inbox: in_rx,
      receiver: receiver,
      sender: sender,
    })
  }

  /// The address this transport receives on, usable as a node's identity.
  pub fn address(&self) -> &Address {
    &self.addr
  }
}
impl Transport for UdpTransport {
  fn send(&mut self, to: &Address, payload: Vec<u8>) -> Result<(), TransportError> {
    let target = SocketAddr::V4(SocketAddrV4::from(*to));
    self
      .outbox
      .send((target, payload))
      .map_err(|_| TransportError::Detached(self.addr))
  }

  fn receive(&mut self) -> Vec<Vec<u8>> {
    self.inbox.try_iter().collect()
  }
}
impl Drop for UdpTransport {
  fn drop(&mut self) {
    self.receiver.abort();
    self.sender.abort();
  }
}

async fn udp_sender(
  addr: Address,
  socket: Arc<UdpSocket>,
  mut outbox: mpsc::UnboundedReceiver<(SocketAddr, Vec<u8>)>,
) {
  while let Some((target, payload)) = outbox.recv().await {
    if let Err(e) = socket.send_to(&payload, target).await {
      debug!(node = %addr, %target, error = %e, "udp send failed");
    }
  }
}

async fn udp_receiver(addr: Address, socket: Arc<UdpSocket>, inbox: Sender<Vec<u8>>) {
  let mut buf = vec![0u8; MAX_PAYLOAD];
  loop {
    let (len, from) = match socket.recv_from(&mut buf[..]).await {
      Ok(recvd) => recvd,
      Err(e) if is_transient(e.kind()) => {
        debug!(node = %addr, error = %e, "udp receive failed, retrying");
        sleep(RECV_BACKOFF).await;
        continue;
      }
      Err(e) => {
        warn!(node = %addr, error = %e, "udp receive failed, receiver stopped");
        return;
      }
    };
    trace!(node = %addr, %from, len, "datagram received");
    if inbox.send(buf[..len].to_vec()).is_err() {
      return;
    }
  }
}

/// Errors a UDP socket reports for one datagram, such as an ICMP unreachable for an earlier send.
fn is_transient(kind: io::ErrorKind) -> bool {
  use io::ErrorKind::*;
  matches!(
    kind,
    ConnectionRefused | ConnectionReset | Interrupted | WouldBlock | TimedOut
  )
}

#[test]
fn test_receive_errors_classified() {
  assert!(is_transient(io::ErrorKind::ConnectionRefused));
  assert!(is_transient(io::ErrorKind::Interrupted));
  assert!(!is_transient(io::ErrorKind::PermissionDenied));
  assert!(!is_transient(io::ErrorKind::InvalidInput));
}
