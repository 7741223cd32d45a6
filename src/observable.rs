//! The observable capability and its composition surface.
//!
//! An observable is "given an observer, start producing, return a handle
//! that stops production". It is immutable and may be subscribed to any
//! number of times, each subscription producing an independent execution.

use std::sync::Arc;

use crate::{
  error::RxError,
  observer::{AllObserver, BoxedObserver, FnMutObserver, Observer},
  scheduler::{Duration, SharedScheduler},
  subscription::BoxSubscription,
};

pub mod create;
pub mod defer;
pub mod from_iter;
pub mod timer;
pub mod trivial;

pub use create::{create, Publisher};
pub use defer::defer;
pub use from_iter::{from_iter, of};
pub use timer::{interval, timer};
pub use trivial::{empty, never, throw};

/// Object-safe core of an observable: the subscription side effect.
///
/// Operators are written against this trait; consumers compose through the
/// [`Observable`] handle.
pub trait CoreObservable<Item>: Send + Sync {
  /// Starts producing toward `observer`; the returned handle stops
  /// production and releases every resource the execution holds.
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription;

  /// Extraction hook for trampolined concatenation: a source that is itself
  /// a concatenation exposes its parts so nesting flattens into a single
  /// drive loop instead of growing the stack. See
  /// [`TrampolineSink`](crate::trampoline::TrampolineSink).
  fn concat_sources(&self) -> Option<Vec<Observable<Item>>> { None }
}

/// Cheap cloneable handle to an observable, carrying the operator surface.
pub struct Observable<Item> {
  core: Arc<dyn CoreObservable<Item>>,
}

impl<Item> Clone for Observable<Item> {
  fn clone(&self) -> Self { Observable { core: self.core.clone() } }
}

impl<Item: Send + 'static> Observable<Item> {
  /// Wraps a [`CoreObservable`] implementation.
  pub fn new(core: impl CoreObservable<Item> + 'static) -> Self {
    Observable { core: Arc::new(core) }
  }

  /// Subscribes the boxed observer. Most callers want [`subscribe`]
  /// (closure) or [`subscribe_observer`] instead.
  ///
  /// [`subscribe`]: Observable::subscribe
  /// [`subscribe_observer`]: Observable::subscribe_observer
  pub fn actual_subscribe(
    &self,
    observer: BoxedObserver<Item>,
  ) -> BoxSubscription {
    self.core.actual_subscribe(observer)
  }

  pub(crate) fn concat_sources(&self) -> Option<Vec<Observable<Item>>> {
    self.core.concat_sources()
  }

  /// Subscribes with a `next` closure; errors and completion are ignored.
  pub fn subscribe(
    &self,
    next: impl FnMut(Item) + Send + 'static,
  ) -> BoxSubscription {
    self.actual_subscribe(Box::new(FnMutObserver(next)))
  }

  /// Subscribes with `next`, `error` and `complete` closures.
  pub fn subscribe_all(
    &self,
    next: impl FnMut(Item) + Send + 'static,
    error: impl FnMut(RxError) + Send + 'static,
    complete: impl FnMut() + Send + 'static,
  ) -> BoxSubscription {
    self.actual_subscribe(Box::new(AllObserver { next, error, complete }))
  }

  /// Subscribes a full observer implementation.
  pub fn subscribe_observer(
    &self,
    observer: impl Observer<Item> + Send + 'static,
  ) -> BoxSubscription {
    self.actual_subscribe(Box::new(observer))
  }

  // ==================== transformation operators ====================

  /// Transforms every value with `f`. A panicking `f` is caught and
  /// forwarded as `error`.
  pub fn map<Out, F>(self, f: F) -> Observable<Out>
  where
    Out: Send + 'static,
    F: Fn(Item) -> Out + Send + Sync + 'static,
  {
    crate::ops::map::map(self, f)
  }

  /// Keeps the values for which `predicate` returns true.
  pub fn filter<F>(self, predicate: F) -> Observable<Item>
  where
    F: Fn(&Item) -> bool + Send + Sync + 'static,
  {
    crate::ops::filter::filter(self, predicate)
  }

  /// Running accumulation: emits every intermediate accumulator value.
  pub fn scan<Acc, F>(self, seed: Acc, f: F) -> Observable<Acc>
  where
    Acc: Clone + Send + Sync + 'static,
    F: Fn(Acc, Item) -> Acc + Send + Sync + 'static,
  {
    crate::ops::scan::scan(self, seed, f)
  }

  /// Passes the first `count` values through, then completes and releases
  /// upstream.
  pub fn take(self, count: usize) -> Observable<Item> {
    crate::ops::take::take(self, count)
  }

  /// Drops the first `count` values.
  pub fn skip(self, count: usize) -> Observable<Item> {
    crate::ops::skip::skip(self, count)
  }

  /// Runs `f` exactly once per subscription, when that execution terminates
  /// or is unsubscribed.
  pub fn finalize<F>(self, f: F) -> Observable<Item>
  where
    F: Fn() + Send + Sync + 'static,
  {
    crate::ops::finalize::finalize(self, f)
  }

  /// Performs the subscription to upstream on `scheduler`.
  pub fn subscribe_on(self, scheduler: SharedScheduler) -> Observable<Item> {
    crate::ops::subscribe_on::subscribe_on(self, scheduler)
  }

  // ==================== aggregation operators ====================

  /// Emits the number of values on completion.
  pub fn count(self) -> Observable<usize> {
    crate::ops::aggregate::count(self)
  }

  /// Emits the checked sum of all values on completion; overflow is
  /// forwarded as `error`.
  pub fn sum(self) -> Observable<Item>
  where
    Item: crate::ops::aggregate::CheckedAdd,
  {
    crate::ops::aggregate::sum(self)
  }

  /// Emits the arithmetic mean of all values on completion; an empty source
  /// completes without a value, an overflowing count errors.
  pub fn average(self) -> Observable<f64>
  where
    Item: Into<f64>,
  {
    crate::ops::aggregate::average(self)
  }

  // ==================== combination operators ====================

  /// Interleaves this stream with `other`.
  pub fn merge(self, other: Observable<Item>) -> Observable<Item> {
    crate::ops::merge::merge(self, other)
  }

  /// Emits every value of this stream, then every value of `other`.
  /// Concat-of-concat flattens into one trampolined drive loop.
  pub fn concat(self, other: Observable<Item>) -> Observable<Item> {
    crate::ops::concat::concat([self, other])
  }

  // ==================== resubscription operators ====================

  /// On error, resubscribes up to `count` times before forwarding the
  /// error.
  pub fn retry(self, count: usize) -> Observable<Item> {
    crate::ops::retry_when::retry(self, count)
  }

  /// On error, feeds the error into `handler`'s signal stream; every value
  /// the returned observable emits triggers a fresh subscription to this
  /// source. The redo observable erroring or completing terminates
  /// downstream the same way.
  pub fn retry_when<S, F>(self, handler: F) -> Observable<Item>
  where
    S: Send + 'static,
    F: Fn(Observable<RxError>) -> Observable<S> + Send + Sync + 'static,
  {
    crate::ops::retry_when::retry_when(self, handler)
  }

  /// Like [`retry_when`](Observable::retry_when), but the signal stream
  /// carries completions instead of errors.
  pub fn repeat_when<S, F>(self, handler: F) -> Observable<Item>
  where
    S: Send + 'static,
    F: Fn(Observable<()>) -> Observable<S> + Send + Sync + 'static,
  {
    crate::ops::retry_when::repeat_when(self, handler)
  }

  // ==================== windowing operators ====================

  /// Partitions the stream into consecutive windows of `count` values.
  pub fn window_count(self, count: usize) -> Observable<Observable<Item>>
  where
    Item: Clone,
  {
    crate::ops::window::window_count(self, count)
  }

  /// Rotates windows every `span` of scheduler time.
  pub fn window_time(
    self,
    span: Duration,
    scheduler: SharedScheduler,
  ) -> Observable<Observable<Item>>
  where
    Item: Clone,
  {
    crate::ops::window::window_time(self, span, scheduler)
  }

  /// Rotates windows on whichever of `count` and `span` trips first; a
  /// count rotation restarts the timer.
  pub fn window_count_or_time(
    self,
    count: usize,
    span: Duration,
    scheduler: SharedScheduler,
  ) -> Observable<Observable<Item>>
  where
    Item: Clone,
  {
    crate::ops::window::window_count_or_time(self, count, span, scheduler)
  }

  /// Rotates windows on every value of `boundary`.
  pub fn window_boundary<B: Send + 'static>(
    self,
    boundary: Observable<B>,
  ) -> Observable<Observable<Item>>
  where
    Item: Clone,
  {
    crate::ops::window::window_boundary(self, boundary)
  }
}

impl<Item: Send + 'static> Observable<Observable<Item>> {
  /// Flattens a stream of streams, running at most `concurrent` inner
  /// subscriptions at a time; further inner sources queue until a slot
  /// frees up.
  pub fn merge_all(self, concurrent: usize) -> Observable<Item> {
    crate::ops::merge::merge_all(self, concurrent)
  }

  /// Flattens a stream of streams one at a time, in order.
  pub fn concat_all(self) -> Observable<Item> { self.merge_all(1) }

  /// Latest-wins flattening: each new inner source supersedes and disposes
  /// the previous one; values from superseded inners are dropped.
  pub fn switch_on_next(self) -> Observable<Item> {
    crate::ops::switch::switch_on_next(self)
  }
}
