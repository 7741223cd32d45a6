//! Ad-hoc sources from a subscribe closure.

use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  serializer::HalfSerializer,
  sink::Sink,
  subscription::BoxSubscription,
};

/// The emission handle given to a [`create`] closure.
///
/// Notifications route through a half-serializer, so a hand-written source
/// may emit from several threads and still never deliver two notifications
/// at once or more than one terminal.
pub struct Publisher<Item> {
  serializer: HalfSerializer<Item>,
}

impl<Item> Clone for Publisher<Item> {
  fn clone(&self) -> Self {
    Publisher { serializer: self.serializer.clone() }
  }
}

impl<Item> Publisher<Item> {
  pub fn next(&self, value: Item) { self.serializer.next(value); }

  pub fn error(&self, err: RxError) { self.serializer.error(err); }

  pub fn complete(&self) { self.serializer.complete(); }

  /// True once the consumer has unsubscribed or a terminal has been
  /// delivered; producers should stop emitting.
  pub fn is_closed(&self) -> bool { self.serializer.sink().is_stopped() }

  /// Registers teardown released when the subscription ends, whichever side
  /// ends it.
  pub fn set_teardown(&self, teardown: BoxSubscription) {
    self.serializer.sink().set_upstream(teardown);
  }
}

struct Create<F> {
  subscribe: F,
}

impl<Item, F> CoreObservable<Item> for Create<F>
where
  Item: Send + 'static,
  F: Fn(Publisher<Item>) + Send + Sync,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let publisher = Publisher { serializer: HalfSerializer::new(sink.clone()) };
    (self.subscribe)(publisher);
    sink.handle()
  }
}

/// Builds an observable from a subscribe function: called once per
/// subscription with a fresh [`Publisher`].
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use rxcore::prelude::*;
///
/// let values = Arc::new(Mutex::new(Vec::new()));
/// let collected = values.clone();
/// observable::create(|publisher: Publisher<i32>| {
///   publisher.next(1);
///   publisher.next(2);
///   publisher.complete();
/// })
/// .subscribe(move |v| collected.lock().unwrap().push(v));
/// assert_eq!(*values.lock().unwrap(), vec![1, 2]);
/// ```
pub fn create<Item, F>(subscribe: F) -> Observable<Item>
where
  Item: Send + 'static,
  F: Fn(Publisher<Item>) + Send + Sync + 'static,
{
  Observable::new(Create { subscribe })
}
