use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::{self, BoxSubscription},
};

struct TakeOp<Item> {
  source: Observable<Item>,
  count: usize,
}

impl<Item: Send + 'static> CoreObservable<Item> for TakeOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    if self.count == 0 {
      sink.forward_complete();
      return subscription::nop();
    }
    let up = self.source.actual_subscribe(Box::new(TakeObserver {
      sink: sink.clone(),
      remaining: self.count,
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct TakeObserver<Item> {
  sink: Sink<Item>,
  remaining: usize,
}

impl<Item> Observer<Item> for TakeObserver<Item> {
  fn next(&mut self, value: Item) {
    if self.remaining == 0 {
      return;
    }
    self.remaining -= 1;
    self.sink.forward_next(value);
    if self.remaining == 0 {
      // completing forwards downstream and releases upstream
      self.sink.forward_complete();
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) { self.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn take<Item: Send + 'static>(
  source: Observable<Item>,
  count: usize,
) -> Observable<Item> {
  Observable::new(TakeOp { source, count })
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::observable::from_iter;

  #[test]
  fn completes_after_count_values() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (e1, e2) = (events.clone(), events.clone());
    from_iter(0..).take(3).subscribe_all(
      move |v| e1.lock().unwrap().push(format!("next({v})")),
      |_| {},
      move || e2.lock().unwrap().push("complete".to_owned()),
    );
    assert_eq!(
      *events.lock().unwrap(),
      vec!["next(0)", "next(1)", "next(2)", "complete"]
    );
  }

  #[test]
  fn take_zero_completes_without_subscribing_upstream() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = events.clone();
    from_iter(0..3)
      .take(0)
      .subscribe_all(|_| {}, |_| {}, move || e.lock().unwrap().push("done"));
    assert_eq!(*events.lock().unwrap(), vec!["done"]);
  }
}
