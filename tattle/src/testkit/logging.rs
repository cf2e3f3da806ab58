use crate::core::{Address, EventLog};
use crate::membership::MembershipEvent;
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// An [`EventLog`] shared by every node of a [`Simulation`](crate::testkit::Simulation). Events
/// are kept in the order the nodes reported them. Clones append to the same log.
#[derive(Clone, Default)]
pub struct RecordingLog {
  events: Rc<RefCell<Vec<(Address, MembershipEvent)>>>,
}
impl RecordingLog {
  /// Creates an empty log.
  pub fn new() -> Self {
    Self::default()
  }

  /// Every `(observer, event)` pair recorded so far.
  pub fn events(&self) -> Vec<(Address, MembershipEvent)> {
    self.events.borrow().clone()
  }

  /// Members `observer` has added, in order.
  pub fn added_by(&self, observer: &Address) -> Vec<Address> {
    self.filter(observer, |e| matches!(e, MembershipEvent::Added(_)))
  }

  /// Members `observer` has evicted, in order.
  pub fn removed_by(&self, observer: &Address) -> Vec<Address> {
    self.filter(observer, |e| matches!(e, MembershipEvent::Removed(_)))
  }

  /// How many times any observer reported `event`.
  pub fn count(&self, event: &MembershipEvent) -> usize {
    self.events.borrow().iter().filter(|(_, e)| e == event).count()
  }

  /// Number of recorded events.
  pub fn len(&self) -> usize {
    self.events.borrow().len()
  }

  /// Whether nothing has been recorded.
  pub fn is_empty(&self) -> bool {
    self.events.borrow().is_empty()
  }

  /// Forgets every recorded event, in every clone.
  pub fn clear(&self) {
    self.events.borrow_mut().clear();
  }

  fn filter(&self, observer: &Address, pred: impl Fn(&MembershipEvent) -> bool) -> Vec<Address> {
    self
      .events
      .borrow()
      .iter()
      .filter(|(o, e)| o == observer && pred(e))
      .map(|(_, e)| *e.member())
      .collect()
  }
}
impl EventLog for RecordingLog {
  fn added(&mut self, observer: &Address, member: &Address) {
    self
      .events
      .borrow_mut()
      .push((*observer, MembershipEvent::Added(*member)));
  }

  fn removed(&mut self, observer: &Address, member: &Address) {
    self
      .events
      .borrow_mut()
      .push((*observer, MembershipEvent::Removed(*member)));
  }
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to `default` when unset. Later
/// calls are no-ops, so every test may call it.
pub fn init_tracing(default: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_test_writer()
    .try_init();
}

#[test]
fn test_recording_log_filters_by_observer() {
  let mut log = RecordingLog::new();
  let shared = log.clone();
  let (a, b, c) = (Address::new(1, 0), Address::new(2, 0), Address::new(3, 0));
  log.added(&a, &b);
  log.added(&b, &a);
  log.removed(&a, &c);
  assert_eq!(shared.len(), 3);
  assert_eq!(shared.added_by(&a), vec![b]);
  assert_eq!(shared.removed_by(&a), vec![c]);
  assert!(shared.removed_by(&b).is_empty());
  assert_eq!(shared.count(&MembershipEvent::Added(a)), 1);
  shared.clear();
  assert!(log.is_empty());
}
