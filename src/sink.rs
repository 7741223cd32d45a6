//! The per-operator-instance execution unit.
//!
//! A [`Sink`] unites "is the observer of upstream" with "owns the downstream
//! forwarding reference", plus the handle of its upstream subscription.
//! Every operator builds on it: the operator's observer applies its logic
//! and forwards through the sink; the sink guarantees that once a terminal
//! notification has been forwarded (or the sink has been unsubscribed) the
//! downstream observer is swapped out and late-arriving calls are silently
//! absorbed, and that the upstream subscription is released exactly once.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use crate::{
  error::RxError,
  observer::{BoxedObserver, Observer},
  subscription::{BoxSubscription, SingleSubscription, Subscription},
};

/// Cloneable handle to one operator instance's delivery state.
///
/// `forward_*` calls must be serialized by the caller — operators provide
/// that either through a [`HalfSerializer`](crate::serializer::HalfSerializer)
/// or through an operator gate where several producers can race.
/// `unsubscribe` may race freely with in-flight delivery.
pub struct Sink<Item> {
  core: Arc<SinkCore<Item>>,
}

impl<Item> Clone for Sink<Item> {
  fn clone(&self) -> Self { Sink { core: self.core.clone() } }
}

struct SinkCore<Item> {
  stopped: AtomicBool,
  slot: Mutex<Option<BoxedObserver<Item>>>,
  upstream: SingleSubscription,
}

impl<Item> Sink<Item> {
  pub fn new(observer: BoxedObserver<Item>) -> Self {
    Sink {
      core: Arc::new(SinkCore {
        stopped: AtomicBool::new(false),
        slot: Mutex::new(Some(observer)),
        upstream: SingleSubscription::new(),
      }),
    }
  }

  /// Assigns the upstream subscription handle. Single-assignment: if the
  /// sink was unsubscribed while the upstream subscription was still being
  /// set up, the incoming handle is released immediately.
  pub fn set_upstream(&self, upstream: BoxSubscription) {
    self.core.upstream.set(upstream);
  }

  /// Forwards a value to the downstream observer.
  pub fn forward_next(&self, value: Item) {
    if self.core.stopped.load(Ordering::Acquire) {
      return;
    }
    let taken = self.core.slot.lock().unwrap().take();
    let Some(mut observer) = taken else { return };
    observer.next(value);
    let mut slot = self.core.slot.lock().unwrap();
    if !self.core.stopped.load(Ordering::Acquire) {
      *slot = Some(observer);
    }
    // otherwise a racing unsubscribe or terminal won while we were
    // delivering; the observer is dropped and late calls are absorbed
  }

  /// Forwards the error terminal: delivers once, then releases upstream.
  pub fn forward_error(&self, err: RxError) {
    if self.core.stopped.swap(true, Ordering::AcqRel) {
      return;
    }
    let taken = self.core.slot.lock().unwrap().take();
    if let Some(mut observer) = taken {
      observer.error(err);
    }
    self.core.upstream.unsubscribe();
  }

  /// Forwards the completion terminal: delivers once, then releases
  /// upstream.
  pub fn forward_complete(&self) {
    if self.core.stopped.swap(true, Ordering::AcqRel) {
      return;
    }
    let taken = self.core.slot.lock().unwrap().take();
    if let Some(mut observer) = taken {
      observer.complete();
    }
    self.core.upstream.unsubscribe();
  }

  /// True once a terminal has been forwarded or the sink unsubscribed, or
  /// when the downstream observer itself reports closed (e.g. a `take`
  /// further down has seen enough).
  pub fn is_stopped(&self) -> bool {
    if self.core.stopped.load(Ordering::Acquire) {
      return true;
    }
    // an empty slot here means the observer is out on loan to an in-flight
    // delivery, not that the sink is done
    self
      .core
      .slot
      .lock()
      .unwrap()
      .as_ref()
      .map_or(false, |o| o.is_closed())
  }

  /// This sink, boxed as the subscription handle handed to the consumer.
  pub fn handle(&self) -> BoxSubscription
  where
    Item: 'static,
  {
    Box::new(self.clone())
  }
}

/// Default forwarding behavior: an observer that passes every notification
/// through its sink unchanged. Operators that add no per-notification logic
/// (e.g. `subscribe_on`) subscribe upstream with this.
pub struct IdentityObserver<Item>(pub Sink<Item>);

impl<Item> Observer<Item> for IdentityObserver<Item> {
  fn next(&mut self, value: Item) { self.0.forward_next(value) }

  fn error(&mut self, err: RxError) { self.0.forward_error(err) }

  fn complete(&mut self) { self.0.forward_complete() }

  fn is_closed(&self) -> bool { self.0.is_stopped() }
}

impl<Item> Subscription for Sink<Item> {
  fn unsubscribe(&self) {
    self.core.stopped.store(true, Ordering::Release);
    // drop the downstream reference first so a late concurrent delivery
    // has nothing to hit, then release upstream (idempotent)
    drop(self.core.slot.lock().unwrap().take());
    self.core.upstream.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.core.stopped.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;
  use crate::{observer::AllObserver, subscription::FnSubscription};

  struct Events {
    next: Vec<i32>,
    errors: usize,
    completes: usize,
  }

  fn recording_sink() -> (Arc<Mutex<Events>>, Sink<i32>) {
    let events = Arc::new(Mutex::new(Events {
      next: vec![],
      errors: 0,
      completes: 0,
    }));
    let (e1, e2, e3) = (events.clone(), events.clone(), events.clone());
    let sink = Sink::new(Box::new(AllObserver {
      next: move |v| e1.lock().unwrap().next.push(v),
      error: move |_: RxError| e2.lock().unwrap().errors += 1,
      complete: move || e3.lock().unwrap().completes += 1,
    }));
    (events, sink)
  }

  #[test]
  fn late_calls_are_absorbed_after_complete() {
    let (events, sink) = recording_sink();
    sink.forward_next(1);
    sink.forward_complete();
    sink.forward_next(2);
    sink.forward_error(RxError::msg("late"));
    sink.forward_complete();

    let ev = events.lock().unwrap();
    assert_eq!(ev.next, vec![1]);
    assert_eq!(ev.errors, 0);
    assert_eq!(ev.completes, 1);
  }

  #[test]
  fn late_calls_are_absorbed_after_error() {
    let (events, sink) = recording_sink();
    sink.forward_error(RxError::msg("boom"));
    sink.forward_next(1);
    sink.forward_complete();

    let ev = events.lock().unwrap();
    assert!(ev.next.is_empty());
    assert_eq!(ev.errors, 1);
    assert_eq!(ev.completes, 0);
  }

  #[test]
  fn terminal_releases_upstream() {
    let (_, sink) = recording_sink();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    sink.set_upstream(FnSubscription::boxed(move || {
      h.fetch_add(1, Ordering::SeqCst);
    }));
    sink.forward_complete();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    sink.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn unsubscribe_wins_over_late_upstream_assignment() {
    let (events, sink) = recording_sink();
    sink.unsubscribe();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    sink.set_upstream(FnSubscription::boxed(move || {
      h.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    sink.forward_next(9);
    assert!(events.lock().unwrap().next.is_empty());
  }
}
