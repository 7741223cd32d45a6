//! Half-serializer: lock-free arbitration of concurrent notification
//! attempts.
//!
//! Multiple producer threads may call `next`/`error`/`complete` at will; the
//! serializer guarantees (a) deliveries to the downstream sink never overlap,
//! (b) at most one terminal notification ever wins, (c) once a terminal is
//! in flight, late `next` attempts are dropped rather than delivered out of
//! order. It is "half" a serializer: a losing concurrent `next` gives up its
//! value instead of queueing it, which is what keeps the hot path free of
//! blocking waits and heap allocation.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use once_cell::sync::OnceCell;

use crate::{error::RxError, sink::Sink};

enum Terminal {
  Error(RxError),
  Complete,
}

/// Serializing front for a [`Sink`].
///
/// State: a work-in-progress counter plus a write-once terminal slot. The
/// thread that moves `wip` from 0 owns delivery; everyone else either drops
/// its value (`next`) or parks the terminal in the slot for the owner's
/// drain loop to pick up. After a terminal has been delivered the counter is
/// pinned above zero so no delivery can ever start again.
pub struct HalfSerializer<Item> {
  inner: Arc<HalfState<Item>>,
}

impl<Item> Clone for HalfSerializer<Item> {
  fn clone(&self) -> Self { HalfSerializer { inner: self.inner.clone() } }
}

struct HalfState<Item> {
  sink: Sink<Item>,
  wip: AtomicUsize,
  terminal: OnceCell<Terminal>,
}

impl<Item> HalfSerializer<Item> {
  pub fn new(sink: Sink<Item>) -> Self {
    HalfSerializer {
      inner: Arc::new(HalfState {
        sink,
        wip: AtomicUsize::new(0),
        terminal: OnceCell::new(),
      }),
    }
  }

  pub fn sink(&self) -> &Sink<Item> { &self.inner.sink }

  /// Attempts to deliver a value. The caller that finds the serializer idle
  /// delivers and then drains; concurrent callers drop their value.
  pub fn next(&self, value: Item) {
    let state = &*self.inner;
    if state.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      // another thread is delivering, or a terminal is already pinned;
      // this value is stale either way
      return;
    }
    state.sink.forward_next(value);
    self.drain(1);
  }

  /// Attempts to deliver the error terminal. Exactly one terminal attempt
  /// ever wins the slot.
  pub fn error(&self, err: RxError) {
    let state = &*self.inner;
    if state.terminal.set(Terminal::Error(err)).is_err() {
      return;
    }
    if state.wip.fetch_add(1, Ordering::AcqRel) == 0 {
      self.emit_terminal();
    }
    // otherwise an active drain loop picks the terminal up
  }

  /// Attempts to deliver the completion terminal.
  pub fn complete(&self) {
    let state = &*self.inner;
    if state.terminal.set(Terminal::Complete).is_err() {
      return;
    }
    if state.wip.fetch_add(1, Ordering::AcqRel) == 0 {
      self.emit_terminal();
    }
  }

  /// Drain loop run by the delivery owner. Checks the terminal slot first
  /// on every iteration, then tries to retire every increment that piled up
  /// behind it (their values were dropped by their callers).
  fn drain(&self, mut expected: usize) {
    let state = &*self.inner;
    loop {
      if state.terminal.get().is_some() {
        // leave wip pinned: delivery is over for good
        self.emit_terminal();
        return;
      }
      match state.wip.compare_exchange(
        expected,
        0,
        Ordering::AcqRel,
        Ordering::Acquire,
      ) {
        Ok(_) => return,
        Err(actual) => expected = actual,
      }
    }
  }

  fn emit_terminal(&self) {
    match self.inner.terminal.get() {
      Some(Terminal::Error(err)) => self.inner.sink.forward_error(err.clone()),
      Some(Terminal::Complete) => self.inner.sink.forward_complete(),
      None => unreachable!("terminal emitted before the slot was won"),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::observer::AllObserver;

  #[derive(Debug, PartialEq)]
  enum Event {
    Next(i32),
    Error,
    Complete,
  }

  fn recording() -> (Arc<Mutex<Vec<Event>>>, HalfSerializer<i32>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (e1, e2, e3) = (events.clone(), events.clone(), events.clone());
    let sink = Sink::new(Box::new(AllObserver {
      next: move |v| e1.lock().unwrap().push(Event::Next(v)),
      error: move |_: RxError| e2.lock().unwrap().push(Event::Error),
      complete: move || e3.lock().unwrap().push(Event::Complete),
    }));
    (events, HalfSerializer::new(sink))
  }

  #[test]
  fn sequential_delivery_in_order() {
    let (events, hs) = recording();
    hs.next(1);
    hs.next(2);
    hs.complete();
    hs.next(3);
    assert_eq!(
      *events.lock().unwrap(),
      vec![Event::Next(1), Event::Next(2), Event::Complete]
    );
  }

  #[test]
  fn terminal_slot_admits_one_winner() {
    let (events, hs) = recording();
    hs.error(RxError::msg("first"));
    hs.complete();
    hs.error(RxError::msg("second"));
    assert_eq!(*events.lock().unwrap(), vec![Event::Error]);
  }

  #[test]
  fn values_after_terminal_are_dropped() {
    let (events, hs) = recording();
    hs.next(1);
    hs.complete();
    for v in 2..10 {
      hs.next(v);
    }
    assert_eq!(
      *events.lock().unwrap(),
      vec![Event::Next(1), Event::Complete]
    );
  }

  #[test]
  fn concurrent_next_with_one_complete() {
    // miniature version of the integration stress property
    for _ in 0..50 {
      let (events, hs) = recording();
      let mut producers = Vec::new();
      for _ in 0..4 {
        let hs = hs.clone();
        producers.push(std::thread::spawn(move || {
          for v in 0..100 {
            hs.next(v);
          }
        }));
      }
      let completer = {
        let hs = hs.clone();
        std::thread::spawn(move || hs.complete())
      };
      for p in producers {
        p.join().unwrap();
      }
      completer.join().unwrap();

      let events = events.lock().unwrap();
      let completes =
        events.iter().filter(|e| **e == Event::Complete).count();
      assert_eq!(completes, 1);
      assert_eq!(*events.last().unwrap(), Event::Complete);
      assert!(events.len() <= 4 * 100 + 1);
    }
  }
}
