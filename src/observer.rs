//! Observer trait and implementations
//!
//! The Observer trait defines the consumer of data in the reactive pattern.
//! It provides three methods: next (for values), error (for errors), and
//! complete (for stream completion).

use crate::error::RxError;

/// Observer trait: the consumer of data in reactive programming.
///
/// Contract: after `error` or `complete` has been delivered, no further
/// calls of any kind are delivered. The engine enforces this structurally
/// (see [`Sink`](crate::sink::Sink) and
/// [`HalfSerializer`](crate::serializer::HalfSerializer)); a hand-written
/// source going through [`Publisher`](crate::observable::Publisher) inherits
/// the same guarantee.
pub trait Observer<Item> {
  /// Receive the next value from the observable.
  fn next(&mut self, value: Item);

  /// Handle an error from the observable. Terminal.
  fn error(&mut self, err: RxError);

  /// Handle completion of the observable. Terminal.
  fn complete(&mut self);

  /// Checks if the observer is closed.
  ///
  /// Sources (like `from_iter`) use this to stop emitting early, e.g. when
  /// a downstream `take` has unsubscribed.
  fn is_closed(&self) -> bool { false }
}

/// Boxed observer with `Send` bound, the uniform currency of the engine.
pub type BoxedObserver<Item> = Box<dyn Observer<Item> + Send>;

impl<Item> Observer<Item> for BoxedObserver<Item> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).next(value) }

  #[inline]
  fn error(&mut self, err: RxError) { (**self).error(err) }

  #[inline]
  fn complete(&mut self) { (**self).complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// Observer that absorbs every notification.
///
/// Swapped into a sink's downstream slot once the sink goes inert, so
/// late-arriving concurrent notifications have a harmless target.
#[derive(Clone, Copy, Default)]
pub struct NopObserver;

impl<Item> Observer<Item> for NopObserver {
  fn next(&mut self, _value: Item) {}

  fn error(&mut self, _err: RxError) {}

  fn complete(&mut self) {}

  fn is_closed(&self) -> bool { true }
}

/// Closure adapter: the closure becomes the `next` handler, `error` and
/// `complete` are ignored.
///
/// Enables `observable.subscribe(|v| println!("{v}"))`.
#[derive(Clone)]
pub struct FnMutObserver<F>(pub F);

impl<F, Item> Observer<Item> for FnMutObserver<F>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.0)(v); }

  fn error(&mut self, _err: RxError) {}

  fn complete(&mut self) {}
}

/// Full three-callback adapter used by `subscribe_all`.
pub struct AllObserver<N, E, C> {
  pub next: N,
  pub error: E,
  pub complete: C,
}

impl<Item, N, E, C> Observer<Item> for AllObserver<N, E, C>
where
  N: FnMut(Item),
  E: FnMut(RxError),
  C: FnMut(),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.next)(v); }

  fn error(&mut self, err: RxError) { (self.error)(err); }

  fn complete(&mut self) { (self.complete)(); }
}

/// `Option` observer: `None` ignores all events, `Some` delegates to the
/// inner observer. Terminal events take the inner out, so anything arriving
/// afterwards is absorbed.
impl<O, Item> Observer<Item> for Option<O>
where
  O: Observer<Item>,
{
  fn next(&mut self, value: Item) {
    if let Some(inner) = self {
      inner.next(value);
    }
  }

  fn error(&mut self, err: RxError) {
    if let Some(mut inner) = self.take() {
      inner.error(err);
    }
  }

  fn complete(&mut self) {
    if let Some(mut inner) = self.take() {
      inner.complete();
    }
  }

  fn is_closed(&self) -> bool {
    self.as_ref().map_or(true, Observer::is_closed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct TestObserver {
    values: Vec<i32>,
  }

  impl Observer<i32> for TestObserver {
    fn next(&mut self, value: i32) { self.values.push(value); }

    fn error(&mut self, _: RxError) {}

    fn complete(&mut self) {}
  }

  #[test]
  fn observer_trait() {
    let mut obs = TestObserver { values: vec![] };
    obs.next(1);
    obs.next(2);
    assert_eq!(obs.values, vec![1, 2]);
    assert!(!obs.is_closed());
  }

  #[test]
  fn closure_as_observer() {
    let mut count = 0;
    let mut closure_obs = FnMutObserver(|v: i32| {
      count += v;
    });

    closure_obs.next(10);
    closure_obs.next(20);
    assert_eq!(count, 30);
  }

  #[test]
  fn option_observer_absorbs_after_terminal() {
    let mut values = vec![];
    {
      let mut obs = Some(FnMutObserver(|v: i32| values.push(v)));
      obs.next(1);
      obs.complete();
      assert!(obs.is_closed());
      obs.next(2);
    }
    assert_eq!(values, vec![1]);
  }
}
