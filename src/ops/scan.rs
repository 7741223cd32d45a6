use std::sync::Arc;

use crate::{
  error::{fault, RxError},
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::BoxSubscription,
};

type Accumulate<Acc, Item> = Arc<dyn Fn(Acc, Item) -> Acc + Send + Sync>;

struct ScanOp<Item, Acc> {
  source: Observable<Item>,
  seed: Acc,
  f: Accumulate<Acc, Item>,
}

impl<Item, Acc> CoreObservable<Acc> for ScanOp<Item, Acc>
where
  Item: Send + 'static,
  Acc: Clone + Send + Sync + 'static,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Acc>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(ScanObserver {
      sink: sink.clone(),
      acc: self.seed.clone(),
      f: self.f.clone(),
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct ScanObserver<Item, Acc> {
  sink: Sink<Acc>,
  acc: Acc,
  f: Accumulate<Acc, Item>,
}

impl<Item, Acc: Clone> Observer<Item> for ScanObserver<Item, Acc> {
  fn next(&mut self, value: Item) {
    let acc = self.acc.clone();
    match fault::guard(|| (self.f)(acc, value)) {
      Ok(next) => {
        self.acc = next.clone();
        self.sink.forward_next(next);
      }
      Err(err) => self.sink.forward_error(err),
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) { self.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn scan<Item, Acc, F>(
  source: Observable<Item>,
  seed: Acc,
  f: F,
) -> Observable<Acc>
where
  Item: Send + 'static,
  Acc: Clone + Send + Sync + 'static,
  F: Fn(Acc, Item) -> Acc + Send + Sync + 'static,
{
  Observable::new(ScanOp { source, seed, f: Arc::new(f) })
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::observable::from_iter;

  #[test]
  fn emits_every_intermediate_accumulation() {
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = got.clone();
    from_iter(1..=4)
      .scan(0, |acc, v| acc + v)
      .subscribe(move |v| g.lock().unwrap().push(v));
    assert_eq!(*got.lock().unwrap(), vec![1, 3, 6, 10]);
  }
}
