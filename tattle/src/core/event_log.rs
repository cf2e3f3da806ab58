use crate::core::Address;
use crate::membership::MembershipEvent;
use crossbeam::channel::Sender;
use tracing::{info, trace};

/// Observes membership changes made by a node. Purely observational: nothing the log does can
/// influence the protocol.
pub trait EventLog {
  /// `observer` added `member` to its table.
  fn added(&mut self, observer: &Address, member: &Address);

  /// `observer` evicted `member` from its table.
  fn removed(&mut self, observer: &Address, member: &Address);

  /// Forwards one event to [`added`](EventLog::added) or [`removed`](EventLog::removed).
  fn record(&mut self, observer: &Address, event: &MembershipEvent) {
    match event {
      MembershipEvent::Added(member) => self.added(observer, member),
      MembershipEvent::Removed(member) => self.removed(observer, member),
    }
  }
}

/// Writes membership changes to the `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLog;
impl EventLog for TracingLog {
  fn added(&mut self, observer: &Address, member: &Address) {
    info!(%observer, %member, "node added");
  }

  fn removed(&mut self, observer: &Address, member: &Address) {
    info!(%observer, %member, "node removed");
  }
}

/// Streams events to a subscriber. Events are discarded once the receiving end hangs up.
impl EventLog for Sender<(Address, MembershipEvent)> {
  fn added(&mut self, observer: &Address, member: &Address) {
    if self.send((*observer, MembershipEvent::Added(*member))).is_err() {
      trace!(%observer, "event subscriber gone");
    }
  }

  fn removed(&mut self, observer: &Address, member: &Address) {
    if self.send((*observer, MembershipEvent::Removed(*member))).is_err() {
      trace!(%observer, "event subscriber gone");
    }
  }
}

#[test]
fn test_sender_log_streams_events() {
  let (tx, rx) = crossbeam::channel::unbounded();
  let mut log = tx;
  let me = Address::new(1, 0);
  log.record(&me, &MembershipEvent::Added(Address::new(2, 0)));
  log.removed(&me, &Address::new(3, 0));
  let events = rx.try_iter().collect::<Vec<_>>();
  assert_eq!(
    events,
    vec![
      (me, MembershipEvent::Added(Address::new(2, 0))),
      (me, MembershipEvent::Removed(Address::new(3, 0))),
    ]
  );
}
