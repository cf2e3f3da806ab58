use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// A member identity is the `(id, port)` pair an [`Address`] decodes to.
pub type Identity = (u32, u16);

/// The network address of a group member.
///
/// An [`Address`] is 6 bytes: a 4 byte id followed by a 2 byte port, both big endian, so
/// addresses order the same way their identities do. Conversion between the two is a bijection.
#[derive(
  Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Address {
  bytes: [u8; Address::SIZE],
}
impl Address {
  /// Number of bytes in an encoded [`Address`].
  pub const SIZE: usize = 6;

  /// Builds the address for an identity.
  pub fn new(id: u32, port: u16) -> Address {
    let mut bytes = [0u8; Self::SIZE];
    bytes[..4].copy_from_slice(&id.to_be_bytes());
    bytes[4..].copy_from_slice(&port.to_be_bytes());
    Address { bytes: bytes }
  }

  /// The id component of this address.
  pub fn id(&self) -> u32 {
    u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
  }

  /// The port component of this address.
  pub fn port(&self) -> u16 {
    u16::from_be_bytes([self.bytes[4], self.bytes[5]])
  }

  /// Decodes this address into its `(id, port)` identity.
  pub fn identity(&self) -> Identity {
    (self.id(), self.port())
  }

  /// The raw bytes of this address.
  pub fn as_bytes(&self) -> &[u8; Address::SIZE] {
    &self.bytes
  }
}
impl From<Identity> for Address {
  fn from((id, port): Identity) -> Self {
    Address::new(id, port)
  }
}
impl From<SocketAddrV4> for Address {
  fn from(addr: SocketAddrV4) -> Self {
    Address::new(u32::from(*addr.ip()), addr.port())
  }
}
impl From<Address> for SocketAddrV4 {
  fn from(addr: Address) -> Self {
    SocketAddrV4::new(Ipv4Addr::from(addr.id()), addr.port())
  }
}
impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.id(), self.port())
  }
}

/// Returned when a string is not of the form `id:port`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {0:?}, expected id:port")]
pub struct ParseAddressError(String);

impl FromStr for Address {
  type Err = ParseAddressError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = || ParseAddressError(s.to_string());
    let (id, port) = s.split_once(':').ok_or_else(err)?;
    let id = id.trim().parse::<u32>().map_err(|_| err())?;
    let port = port.trim().parse::<u16>().map_err(|_| err())?;
    Ok(Address::new(id, port))
  }
}

#[test]
fn test_address_identity_bijection() {
  let addr = Address::new(0x0a0b0c0d, 0x1f90);
  assert_eq!(addr.as_bytes(), &[0x0a, 0x0b, 0x0c, 0x0d, 0x1f, 0x90]);
  assert_eq!(addr.identity(), (0x0a0b0c0d, 0x1f90));
  assert_eq!(Address::from(addr.identity()), addr);
}

#[test]
fn test_address_orders_by_identity() {
  assert!(Address::new(1, 9) < Address::new(2, 0));
  assert!(Address::new(2, 0) < Address::new(2, 1));
}

#[test]
fn test_address_socket_conversion() {
  let sock = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 7201);
  let addr = Address::from(sock);
  assert_eq!(addr.id(), 0x7f000001);
  assert_eq!(SocketAddrV4::from(addr), sock);
}

#[test]
fn test_address_parse_display() {
  let addr: Address = "1:0".parse().unwrap();
  assert_eq!(addr, Address::new(1, 0));
  assert_eq!(addr.to_string(), "1:0");
  assert!("1".parse::<Address>().is_err());
  assert!("x:0".parse::<Address>().is_err());
  assert!("1:70000".parse::<Address>().is_err());
}
