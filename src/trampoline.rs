//! Trampolined sequential subscription.
//!
//! Operators that subscribe to the *next* source only after the *current*
//! one terminates (concatenation-style) must not recurse for each
//! synchronously-completing source: a chain of 100,000 immediate sources
//! would exhaust the stack. The trampoline keeps an explicit "subscribe-next
//! pending" counter: a request made while a drive loop is already active on
//! some stack is deferred by bumping the counter, and the active loop picks
//! it up after the current subscribe call returns.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

use crate::{
  error::RxError,
  observable::Observable,
  observer::Observer,
  sink::Sink,
  subscription::{SerialSubscription, SingleSubscription, Subscription},
};

/// Drives a sequence of sources one at a time into a [`Sink`], advancing on
/// each inner completion, completing downstream when the sequence runs dry.
pub struct TrampolineSink<Item> {
  inner: Arc<TrampolineState<Item>>,
}

impl<Item> Clone for TrampolineSink<Item> {
  fn clone(&self) -> Self { TrampolineSink { inner: self.inner.clone() } }
}

type SourceStack<Item> = Vec<std::vec::IntoIter<Observable<Item>>>;

struct TrampolineState<Item> {
  sink: Sink<Item>,
  wip: AtomicUsize,
  stack: Mutex<SourceStack<Item>>,
  serial: SerialSubscription,
}

impl<Item: Send + 'static> TrampolineSink<Item> {
  /// Builds the trampoline over `sources`. The caller owns wiring
  /// `serial` into the sink's upstream so unsubscribing tears down the
  /// in-flight inner subscription.
  pub fn new(
    sink: Sink<Item>,
    sources: Vec<Observable<Item>>,
    serial: SerialSubscription,
  ) -> Self {
    TrampolineSink {
      inner: Arc::new(TrampolineState {
        sink,
        wip: AtomicUsize::new(0),
        stack: Mutex::new(vec![sources.into_iter()]),
        serial,
      }),
    }
  }

  /// Starts the drive loop; also called by each inner completion to request
  /// the next subscription.
  pub fn drive(&self) {
    // recursion-pending flag: whoever sees 0 owns the loop, everyone else
    // leaves a request behind and unwinds
    if self.inner.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut pending = 1;
    while pending > 0 {
      if self.inner.sink.is_stopped() {
        self.inner.stack.lock().unwrap().clear();
        return;
      }
      match self.next_source() {
        Some(source) => {
          // replace the finished inner subscription before the next
          // subscribe so disposal tracks the live one
          let current = SingleSubscription::new();
          self.inner.serial.set(Box::new(current.clone()));
          let up = source
            .actual_subscribe(Box::new(InnerObserver { parent: self.clone() }));
          current.set(up);
        }
        None => {
          self.inner.stack.lock().unwrap().clear();
          self.inner.sink.forward_complete();
          return;
        }
      }
      pending = self.inner.wip.fetch_sub(1, Ordering::AcqRel) - 1;
    }
  }

  /// Pops the next source, flattening any source that is itself a
  /// concatenation onto the stack instead of subscribing through it.
  fn next_source(&self) -> Option<Observable<Item>> {
    let mut stack = self.inner.stack.lock().unwrap();
    loop {
      let top = stack.last_mut()?;
      match top.next() {
        Some(source) => match source.concat_sources() {
          Some(nested) => stack.push(nested.into_iter()),
          None => return Some(source),
        },
        None => {
          stack.pop();
        }
      }
    }
  }
}

struct InnerObserver<Item> {
  parent: TrampolineSink<Item>,
}

impl<Item: Send + 'static> Observer<Item> for InnerObserver<Item> {
  fn next(&mut self, value: Item) {
    self.parent.inner.sink.forward_next(value);
  }

  fn error(&mut self, err: RxError) {
    self.parent.inner.stack.lock().unwrap().clear();
    self.parent.inner.sink.forward_error(err);
    self.parent.inner.serial.unsubscribe();
  }

  fn complete(&mut self) { self.parent.drive(); }

  fn is_closed(&self) -> bool { self.parent.inner.sink.is_stopped() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::observable::from_iter;
  use crate::observer::AllObserver;

  fn run_concat(sources: Vec<Observable<i32>>) -> (Vec<i32>, usize) {
    let events = Arc::new(Mutex::new((Vec::new(), 0)));
    let (e1, e2) = (events.clone(), events.clone());
    let sink = Sink::new(Box::new(AllObserver {
      next: move |v| e1.lock().unwrap().0.push(v),
      error: |_: RxError| {},
      complete: move || e2.lock().unwrap().1 += 1,
    }));
    let serial = SerialSubscription::new();
    sink.set_upstream(Box::new(serial.clone()));
    TrampolineSink::new(sink, sources, serial).drive();
    let events = events.lock().unwrap();
    (events.0.clone(), events.1)
  }

  #[test]
  fn drives_sources_in_order() {
    let (values, completes) =
      run_concat(vec![from_iter(0..3), from_iter(3..6)]);
    assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(completes, 1);
  }

  #[test]
  fn empty_sequence_completes_immediately() {
    let (values, completes) = run_concat(vec![]);
    assert!(values.is_empty());
    assert_eq!(completes, 1);
  }

  #[test]
  fn synchronous_sources_do_not_grow_the_stack() {
    let sources: Vec<_> = (0..100_000).map(|i| from_iter(i..i + 1)).collect();
    let (values, completes) = run_concat(sources);
    assert_eq!(values.len(), 100_000);
    assert_eq!(values[0], 0);
    assert_eq!(values[99_999], 99_999);
    assert_eq!(completes, 1);
  }
}
