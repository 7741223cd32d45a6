use std::sync::Arc;

use crate::{
  error::{fault, RxError},
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::BoxSubscription,
};

struct MapOp<In, Out> {
  source: Observable<In>,
  f: Arc<dyn Fn(In) -> Out + Send + Sync>,
}

impl<In, Out> CoreObservable<Out> for MapOp<In, Out>
where
  In: Send + 'static,
  Out: Send + 'static,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Out>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(MapObserver {
      sink: sink.clone(),
      f: self.f.clone(),
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct MapObserver<In, Out> {
  sink: Sink<Out>,
  f: Arc<dyn Fn(In) -> Out + Send + Sync>,
}

impl<In, Out> Observer<In> for MapObserver<In, Out> {
  fn next(&mut self, value: In) {
    match fault::guard(|| (self.f)(value)) {
      Ok(out) => self.sink.forward_next(out),
      Err(err) => self.sink.forward_error(err),
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) { self.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn map<In, Out, F>(
  source: Observable<In>,
  f: F,
) -> Observable<Out>
where
  In: Send + 'static,
  Out: Send + 'static,
  F: Fn(In) -> Out + Send + Sync + 'static,
{
  Observable::new(MapOp { source, f: Arc::new(f) })
}
