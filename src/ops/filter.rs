use std::sync::Arc;

use crate::{
  error::{fault, RxError},
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::BoxSubscription,
};

struct FilterOp<Item> {
  source: Observable<Item>,
  predicate: Arc<dyn Fn(&Item) -> bool + Send + Sync>,
}

impl<Item: Send + 'static> CoreObservable<Item> for FilterOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(FilterObserver {
      sink: sink.clone(),
      predicate: self.predicate.clone(),
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct FilterObserver<Item> {
  sink: Sink<Item>,
  predicate: Arc<dyn Fn(&Item) -> bool + Send + Sync>,
}

impl<Item> Observer<Item> for FilterObserver<Item> {
  fn next(&mut self, value: Item) {
    match fault::guard(|| (self.predicate)(&value)) {
      Ok(true) => self.sink.forward_next(value),
      Ok(false) => {}
      Err(err) => self.sink.forward_error(err),
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) { self.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn filter<Item, F>(
  source: Observable<Item>,
  predicate: F,
) -> Observable<Item>
where
  Item: Send + 'static,
  F: Fn(&Item) -> bool + Send + Sync + 'static,
{
  Observable::new(FilterOp { source, predicate: Arc::new(predicate) })
}
