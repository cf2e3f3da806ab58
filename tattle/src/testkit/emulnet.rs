use crate::core::{Address, Transport, TransportError};
use crate::membership::Round;
use crate::testkit::FailureConfigMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::trace;

/// Message counters for one attached address.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NetStats {
  /// Messages this address handed to the network, lost ones included.
  pub sent: u64,
  /// Messages this address drained from its inbox.
  pub received: u64,
  /// Messages addressed to this address that the network lost.
  pub dropped: u64,
}

struct InFlight {
  to: Address,
  due: Round,
  payload: Vec<u8>,
}

struct NetState {
  now: Round,
  fail_map: FailureConfigMap,
  rng: SmallRng,
  capacity: usize,
  in_flight: Vec<InFlight>,
  inboxes: HashMap<Address, VecDeque<Vec<u8>>>,
  stats: HashMap<Address, NetStats>,
}

/// An in-memory network shared by emulated nodes.
///
/// A message sent during round `t` sits in flight until [`deliver`](EmulNet::deliver) is called
/// for round `t + 1` or later, plus any configured delay. Messages are lost according to the
/// [`FailureConfigMap`] of their destination, and refused outright once the destination has
/// `capacity` messages queued. Clones share the same network.
#[derive(Clone)]
pub struct EmulNet {
  state: Rc<RefCell<NetState>>,
}
impl EmulNet {
  /// Creates a network refusing sends once a destination has `capacity` messages queued. `seed`
  /// drives loss and delay.
  pub fn new(fail_map: FailureConfigMap, capacity: usize, seed: u64) -> EmulNet {
    EmulNet {
      state: Rc::new(RefCell::new(NetState {
        now: 0,
        fail_map: fail_map,
        rng: SmallRng::seed_from_u64(seed),
        capacity: capacity,
        in_flight: Vec::new(),
        inboxes: HashMap::new(),
        stats: HashMap::new(),
      })),
    }
  }

  /// Connects `addr` to the network and returns its [`Transport`].
  pub fn attach(&self, addr: Address) -> EmulEndpoint {
    let mut state = self.state.borrow_mut();
    state.inboxes.entry(addr).or_insert_with(VecDeque::new);
    state.stats.entry(addr).or_insert_with(NetStats::default);
    EmulEndpoint {
      addr: addr,
      net: self.clone(),
    }
  }

  /// Disconnects `addr`. Its queued messages are lost and nothing more is delivered to it.
  pub fn detach(&self, addr: &Address) {
    self.state.borrow_mut().inboxes.remove(addr);
  }

  /// Moves every message due by round `now` into its destination's inbox, in send order.
  pub fn deliver(&self, now: Round) {
    let mut guard = self.state.borrow_mut();
    let state = &mut *guard;
    state.now = now;
    let (due, later): (Vec<_>, Vec<_>) = state.in_flight.drain(..).partition(|m| m.due <= now);
    state.in_flight = later;
    for msg in due {
      match state.inboxes.get_mut(&msg.to) {
        Some(inbox) => inbox.push_back(msg.payload),
        None => trace!(to = %msg.to, "destination detached, message lost"),
      }
    }
  }

  /// Replaces the failure settings from now on.
  pub fn set_failure_map(&self, fail_map: FailureConfigMap) {
    self.state.borrow_mut().fail_map = fail_map;
  }

  /// Counters for `addr`.
  pub fn stats(&self, addr: &Address) -> NetStats {
    self.state.borrow().stats.get(addr).copied().unwrap_or_default()
  }

  /// Messages sent but not yet delivered.
  pub fn in_flight(&self) -> usize {
    self.state.borrow().in_flight.len()
  }

  fn send(&self, from: &Address, to: &Address, payload: Vec<u8>) -> Result<(), TransportError> {
    let mut guard = self.state.borrow_mut();
    let state = &mut *guard;
    if !state.inboxes.contains_key(from) {
      return Err(TransportError::Detached(*from));
    }
    let queued = state.inboxes.get(to).map_or(0, VecDeque::len)
      + state.in_flight.iter().filter(|m| m.to == *to).count();
    if queued >= state.capacity {
      return Err(TransportError::InboxFull(*to));
    }
    state.stats.entry(*from).or_default().sent += 1;
    let fail_cfg = *state.fail_map.get(to);
    if state.rng.gen::<f64>() < fail_cfg.drop_prob {
      state.stats.entry(*to).or_default().dropped += 1;
      trace!(%from, %to, "message dropped");
      return Ok(());
    }
    let delay = fail_cfg
      .delay
      .map_or(0, |(min, max)| state.rng.gen_range(min..=max.max(min)));
    let due = state.now + 1 + delay;
    state.in_flight.push(InFlight {
      to: *to,
      due: due,
      payload: payload,
    });
    Ok(())
  }

  fn receive(&self, addr: &Address) -> Vec<Vec<u8>> {
    let mut guard = self.state.borrow_mut();
    let state = &mut *guard;
    let msgs = match state.inboxes.get_mut(addr) {
      Some(inbox) => inbox.drain(..).collect::<Vec<_>>(),
      None => return vec![],
    };
    state.stats.entry(*addr).or_default().received += msgs.len() as u64;
    msgs
  }
}

/// One address's connection to an [`EmulNet`].
#[derive(Clone)]
pub struct EmulEndpoint {
  addr: Address,
  net: EmulNet,
}
impl EmulEndpoint {
  /// The address this endpoint sends from.
  pub fn address(&self) -> &Address {
    &self.addr
  }
}
impl Transport for EmulEndpoint {
  fn send(&mut self, to: &Address, payload: Vec<u8>) -> Result<(), TransportError> {
    self.net.send(&self.addr, to, payload)
  }

  fn receive(&mut self) -> Vec<Vec<u8>> {
    self.net.receive(&self.addr)
  }
}
