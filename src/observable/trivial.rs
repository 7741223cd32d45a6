//! Trivial sources: empty, never, throw.

use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  sink::Sink,
  subscription::{self, BoxSubscription},
};

struct Empty;

impl<Item: Send + 'static> CoreObservable<Item> for Empty {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    sink.forward_complete();
    subscription::nop()
  }
}

/// Completes immediately without emitting. Carries no state.
pub fn empty<Item: Send + 'static>() -> Observable<Item> {
  Observable::new(Empty)
}

struct Never;

impl<Item: Send + 'static> CoreObservable<Item> for Never {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    Sink::new(observer).handle()
  }
}

/// Never emits and never terminates; only unsubscribing ends it.
pub fn never<Item: Send + 'static>() -> Observable<Item> {
  Observable::new(Never)
}

struct Throw {
  err: RxError,
}

impl<Item: Send + 'static> CoreObservable<Item> for Throw {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    sink.forward_error(self.err.clone());
    subscription::nop()
  }
}

/// Errors immediately with `err`.
pub fn throw<Item: Send + 'static>(err: RxError) -> Observable<Item> {
  Observable::new(Throw { err })
}
