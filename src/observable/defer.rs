//! Source built lazily, once per subscription.

use crate::{
  error::fault,
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  sink::Sink,
  subscription::{self, BoxSubscription},
};

struct Defer<F> {
  factory: F,
}

impl<Item, F> CoreObservable<Item> for Defer<F>
where
  Item: Send + 'static,
  F: Fn() -> Observable<Item> + Send + Sync,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    // a panicking factory becomes a downstream error, not an unwound
    // subscribe call
    match fault::guard(&self.factory) {
      Ok(source) => source.actual_subscribe(observer),
      Err(err) => {
        let sink = Sink::new(observer);
        sink.forward_error(err);
        subscription::nop()
      }
    }
  }
}

/// Calls `factory` at subscription time and subscribes to whatever it
/// returns, so each subscriber observes a fresh execution of a fresh source.
pub fn defer<Item, F>(factory: F) -> Observable<Item>
where
  Item: Send + 'static,
  F: Fn() -> Observable<Item> + Send + Sync + 'static,
{
  Observable::new(Defer { factory })
}
