use crate::core::Address;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A round number of the external clock.
pub type Round = u64;

/// What a node knows about one member.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
  /// Identity of the member; the table key.
  pub id: u32,
  /// Port of the member.
  pub port: u16,
  /// Logical clock advanced by the member itself. Never decreases.
  pub heartbeat: u64,
  /// The local round at which this record was last refreshed. Never sent over the wire.
  #[serde(skip)]
  pub last_seen: Round,
}
impl MemberRecord {
  /// A record for `addr`, seen at round `now`.
  pub fn new(addr: &Address, heartbeat: u64, now: Round) -> MemberRecord {
    MemberRecord {
      id: addr.id(),
      port: addr.port(),
      heartbeat: heartbeat,
      last_seen: now,
    }
  }

  /// The address this record's identity encodes to.
  pub fn address(&self) -> Address {
    Address::new(self.id, self.port)
  }

  /// Rounds elapsed since this record was last refreshed.
  pub fn idle(&self, now: Round) -> Round {
    now.saturating_sub(self.last_seen)
  }
}

/// One node's view of the group, keyed by member id. The node's own record is inserted on
/// creation and can never be removed.
#[derive(Clone)]
pub struct MembershipTable {
  me: Address,
  members: BTreeMap<u32, MemberRecord>,
}
impl MembershipTable {
  /// Creates a table holding only the owner, with heartbeat `0`.
  pub fn new(me: Address, now: Round) -> MembershipTable {
    let mut members = BTreeMap::new();
    members.insert(me.id(), MemberRecord::new(&me, 0, now));
    MembershipTable {
      me: me,
      members: members,
    }
  }

  /// The record for member `id`, if known.
  pub fn get(&self, id: u32) -> Option<&MemberRecord> {
    self.members.get(&id)
  }

  pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut MemberRecord> {
    self.members.get_mut(&id)
  }

  /// Inserts or overwrites the record for `record.id`.
  pub fn put(&mut self, record: MemberRecord) {
    self.members.insert(record.id, record);
  }

  /// Removes and returns the record for `id`. The owner's record stays put.
  pub fn remove(&mut self, id: u32) -> Option<MemberRecord> {
    if id == self.me.id() {
      return None;
    }
    self.members.remove(&id)
  }

  /// A copy of every record, each id once.
  pub fn values(&self) -> Vec<MemberRecord> {
    self.members.values().copied().collect()
  }

  /// Records in id order.
  pub fn iter(&self) -> impl Iterator<Item = &MemberRecord> {
    self.members.values()
  }

  /// The `idx`th record in id order, for uniform selection.
  pub(crate) fn nth(&self, idx: usize) -> Option<&MemberRecord> {
    self.members.values().nth(idx)
  }

  /// The owner's id.
  pub fn self_id(&self) -> u32 {
    self.me.id()
  }

  /// The owner's address.
  pub fn self_address(&self) -> &Address {
    &self.me
  }

  /// The owner's own record.
  pub fn own(&self) -> &MemberRecord {
    &self.members[&self.me.id()]
  }

  /// Whether member `id` is in the table.
  pub fn contains(&self, id: u32) -> bool {
    self.members.contains_key(&id)
  }

  /// Number of members, the owner included.
  pub fn len(&self) -> usize {
    self.members.len()
  }

  /// Never true: the owner is always present.
  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  /// Addresses of every member, in id order.
  pub fn addresses(&self) -> Vec<Address> {
    self.members.values().map(MemberRecord::address).collect()
  }

  /// Heartbeat of every member, cheap to clone and compare across nodes.
  pub fn heartbeats(&self) -> im::OrdMap<u32, u64> {
    self.members.values().map(|r| (r.id, r.heartbeat)).collect()
  }

  /// Increments the owner's heartbeat and marks it seen at `now`.
  pub(crate) fn advance_own(&mut self, now: Round) -> u64 {
    let me = self.me;
    let own = self
      .members
      .entry(me.id())
      .or_insert_with(|| MemberRecord::new(&me, 0, now));
    own.heartbeat += 1;
    own.last_seen = now;
    own.heartbeat
  }
}
impl fmt::Debug for MembershipTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MembershipTable")
      .field("me", &self.me.to_string())
      .field(
        "members",
        &self
          .members
          .values()
          .map(|r| format!("{}:{} hb={} seen={}", r.id, r.port, r.heartbeat, r.last_seen))
          .join(", "),
      )
      .finish()
  }
}
