use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::BoxSubscription,
};

struct SkipOp<Item> {
  source: Observable<Item>,
  count: usize,
}

impl<Item: Send + 'static> CoreObservable<Item> for SkipOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(SkipObserver {
      sink: sink.clone(),
      remaining: self.count,
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct SkipObserver<Item> {
  sink: Sink<Item>,
  remaining: usize,
}

impl<Item> Observer<Item> for SkipObserver<Item> {
  fn next(&mut self, value: Item) {
    if self.remaining > 0 {
      self.remaining -= 1;
    } else {
      self.sink.forward_next(value);
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) { self.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn skip<Item: Send + 'static>(
  source: Observable<Item>,
  count: usize,
) -> Observable<Item> {
  Observable::new(SkipOp { source, count })
}
