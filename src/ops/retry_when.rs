//! Resubscription driven by a redo signal stream.
//!
//! On upstream error (`retry_when`) or completion (`repeat_when`) the
//! terminal event is published onto an internal subject feeding the
//! user-supplied redo observable; every value that observable emits triggers
//! a fresh subscription to the upstream source. Resubscription requests go
//! through a wip trampoline so a synchronously failing source cannot recurse
//! unboundedly, and both the upstream path and the redo path emit toward
//! downstream through one half-serializer.

use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

use crate::{
  error::{fault, RxError},
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  serializer::HalfSerializer,
  sink::Sink,
  subject::PublishSubject,
  subscription::{
    self, BoxSubscription, CompositeSubscription, SerialSubscription,
    SingleSubscription,
  },
};

struct RedoShared<Item, Sig> {
  source: Observable<Item>,
  serializer: HalfSerializer<Item>,
  signals: PublishSubject<Sig>,
  // the in-flight source attempt; replaced on every resubscription
  serial: SerialSubscription,
  wip: AtomicUsize,
}

impl<Item, Sig> RedoShared<Item, Sig>
where
  Item: Send + 'static,
  Sig: Clone + Send + 'static,
{
  /// Requests a fresh subscription to the source. A request arriving while
  /// a subscribe is already running on this stack is deferred through the
  /// wip counter and picked up by the active loop, bounding stack depth
  /// for synchronously terminating sources.
  fn resubscribe(
    self: &Arc<Self>,
    make_observer: fn(Arc<Self>) -> BoxedObserver<Item>,
  ) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut pending = 1;
    while pending > 0 {
      if self.serializer.sink().is_stopped() {
        return;
      }
      let current = SingleSubscription::new();
      self.serial.set(Box::new(current.clone()));
      let up = self.source.actual_subscribe(make_observer(self.clone()));
      current.set(up);
      pending = self.wip.fetch_sub(1, Ordering::AcqRel) - 1;
    }
  }
}

/// Observes the redo observable; every value means "subscribe again".
struct RedoObserver<Item, Sig, S> {
  shared: Arc<RedoShared<Item, Sig>>,
  make_observer: fn(Arc<RedoShared<Item, Sig>>) -> BoxedObserver<Item>,
  _marker: PhantomData<fn(S)>,
}

impl<Item, Sig, S> Observer<S> for RedoObserver<Item, Sig, S>
where
  Item: Send + 'static,
  Sig: Clone + Send + 'static,
{
  fn next(&mut self, _signal: S) {
    self.shared.resubscribe(self.make_observer);
  }

  fn error(&mut self, err: RxError) { self.shared.serializer.error(err); }

  fn complete(&mut self) { self.shared.serializer.complete(); }

  fn is_closed(&self) -> bool { self.shared.serializer.sink().is_stopped() }
}

struct RetrySourceObserver<Item> {
  shared: Arc<RedoShared<Item, RxError>>,
}

impl<Item: Send + 'static> Observer<Item> for RetrySourceObserver<Item> {
  fn next(&mut self, value: Item) { self.shared.serializer.next(value); }

  fn error(&mut self, err: RxError) {
    // the error becomes a redo signal instead of a terminal
    self.shared.signals.clone().next(err);
  }

  fn complete(&mut self) { self.shared.serializer.complete(); }

  fn is_closed(&self) -> bool { self.shared.serializer.sink().is_stopped() }
}

struct RepeatSourceObserver<Item> {
  shared: Arc<RedoShared<Item, ()>>,
}

impl<Item: Send + 'static> Observer<Item> for RepeatSourceObserver<Item> {
  fn next(&mut self, value: Item) { self.shared.serializer.next(value); }

  fn error(&mut self, err: RxError) { self.shared.serializer.error(err); }

  fn complete(&mut self) {
    // the completion becomes a redo signal instead of a terminal
    self.shared.signals.clone().next(());
  }

  fn is_closed(&self) -> bool { self.shared.serializer.sink().is_stopped() }
}

fn retry_source_observer<Item: Send + 'static>(
  shared: Arc<RedoShared<Item, RxError>>,
) -> BoxedObserver<Item> {
  Box::new(RetrySourceObserver { shared })
}

fn repeat_source_observer<Item: Send + 'static>(
  shared: Arc<RedoShared<Item, ()>>,
) -> BoxedObserver<Item> {
  Box::new(RepeatSourceObserver { shared })
}

fn redo_subscribe<Item, Sig, S, F>(
  source: &Observable<Item>,
  handler: &F,
  observer: BoxedObserver<Item>,
  make_observer: fn(Arc<RedoShared<Item, Sig>>) -> BoxedObserver<Item>,
) -> BoxSubscription
where
  Item: Send + 'static,
  Sig: Clone + Send + 'static,
  S: Send + 'static,
  F: Fn(Observable<Sig>) -> Observable<S> + Send + Sync,
{
  let sink = Sink::new(observer);
  let signals = PublishSubject::new();
  // a panicking handler aborts setup: nothing has been subscribed yet, so
  // there is nothing to leak
  let redo = match fault::guard(|| handler(signals.observable())) {
    Ok(redo) => redo,
    Err(err) => {
      sink.forward_error(err);
      return subscription::nop();
    }
  };

  let serial = SerialSubscription::new();
  let redo_single = SingleSubscription::new();
  let teardown = CompositeSubscription::new();
  teardown.add(Box::new(serial.clone()));
  teardown.add(Box::new(redo_single.clone()));
  sink.set_upstream(Box::new(teardown));

  let shared = Arc::new(RedoShared {
    source: source.clone(),
    serializer: HalfSerializer::new(sink.clone()),
    signals,
    serial,
    wip: AtomicUsize::new(0),
  });
  // the redo chain subscribes first so synchronous signals are observed
  let redo_up = redo.actual_subscribe(Box::new(RedoObserver {
    shared: shared.clone(),
    make_observer,
    _marker: PhantomData,
  }));
  redo_single.set(redo_up);
  shared.resubscribe(make_observer);
  sink.handle()
}

struct RetryWhenOp<Item, S, F> {
  source: Observable<Item>,
  handler: F,
  _marker: PhantomData<fn() -> S>,
}

impl<Item, S, F> CoreObservable<Item> for RetryWhenOp<Item, S, F>
where
  Item: Send + 'static,
  S: Send + 'static,
  F: Fn(Observable<RxError>) -> Observable<S> + Send + Sync,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    redo_subscribe(
      &self.source,
      &self.handler,
      observer,
      retry_source_observer::<Item>,
    )
  }
}

struct RepeatWhenOp<Item, S, F> {
  source: Observable<Item>,
  handler: F,
  _marker: PhantomData<fn() -> S>,
}

impl<Item, S, F> CoreObservable<Item> for RepeatWhenOp<Item, S, F>
where
  Item: Send + 'static,
  S: Send + 'static,
  F: Fn(Observable<()>) -> Observable<S> + Send + Sync,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    redo_subscribe(
      &self.source,
      &self.handler,
      observer,
      repeat_source_observer::<Item>,
    )
  }
}

pub(crate) fn retry_when<Item, S, F>(
  source: Observable<Item>,
  handler: F,
) -> Observable<Item>
where
  Item: Send + 'static,
  S: Send + 'static,
  F: Fn(Observable<RxError>) -> Observable<S> + Send + Sync + 'static,
{
  Observable::new(RetryWhenOp { source, handler, _marker: PhantomData })
}

pub(crate) fn repeat_when<Item, S, F>(
  source: Observable<Item>,
  handler: F,
) -> Observable<Item>
where
  Item: Send + 'static,
  S: Send + 'static,
  F: Fn(Observable<()>) -> Observable<S> + Send + Sync + 'static,
{
  Observable::new(RepeatWhenOp { source, handler, _marker: PhantomData })
}

// ==================== retry(count) ====================

struct RetryLimitOp {
  errors: Observable<RxError>,
  max: usize,
}

impl CoreObservable<RxError> for RetryLimitOp {
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<RxError>,
  ) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.errors.actual_subscribe(Box::new(RetryLimitObserver {
      sink: sink.clone(),
      attempts: 0,
      max: self.max,
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct RetryLimitObserver {
  sink: Sink<RxError>,
  attempts: usize,
  max: usize,
}

impl Observer<RxError> for RetryLimitObserver {
  fn next(&mut self, err: RxError) {
    if self.attempts < self.max {
      self.attempts += 1;
      self.sink.forward_next(err);
    } else {
      // retries exhausted: the original error terminates downstream
      self.sink.forward_error(err);
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) { self.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

/// `retry(n)`: up to `n` resubscriptions, then the error is forwarded.
pub(crate) fn retry<Item: Send + 'static>(
  source: Observable<Item>,
  count: usize,
) -> Observable<Item> {
  retry_when(source, move |errors| {
    Observable::new(RetryLimitOp { errors, max: count })
  })
}
