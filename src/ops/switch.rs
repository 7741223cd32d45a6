//! Latest-wins flattening.

use std::sync::{Arc, Mutex};

use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::{
    BoxSubscription, CompositeSubscription, SerialSubscription,
    SingleSubscription, Subscription,
  },
};

struct SwitchOp<Item> {
  source: Observable<Observable<Item>>,
}

impl<Item: Send + 'static> CoreObservable<Item> for SwitchOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let shared = Arc::new(SwitchShared {
      sink: sink.clone(),
      data: Mutex::new(SwitchData {
        latest_id: 0,
        inner_active: false,
        outer_done: false,
      }),
      inner_serial: SerialSubscription::new(),
    });

    let outer = SingleSubscription::new();
    let teardown = CompositeSubscription::new();
    teardown.add(Box::new(outer.clone()));
    teardown.add(Box::new(shared.inner_serial.clone()));
    sink.set_upstream(Box::new(teardown));

    let up = self
      .source
      .actual_subscribe(Box::new(OuterObserver { shared }));
    outer.set(up);
    sink.handle()
  }
}

struct SwitchData {
  // monotonically increasing; only the inner carrying the current id may
  // forward
  latest_id: u64,
  inner_active: bool,
  outer_done: bool,
}

struct SwitchShared<Item> {
  sink: Sink<Item>,
  data: Mutex<SwitchData>,
  inner_serial: SerialSubscription,
}

struct OuterObserver<Item> {
  shared: Arc<SwitchShared<Item>>,
}

impl<Item: Send + 'static> Observer<Observable<Item>> for OuterObserver<Item> {
  fn next(&mut self, inner: Observable<Item>) {
    let id = {
      let mut data = self.shared.data.lock().unwrap();
      data.latest_id += 1;
      data.inner_active = true;
      data.latest_id
    };
    // replacing through the serial releases the superseded inner
    // immediately; its late values now fail the id check
    let current = SingleSubscription::new();
    self.shared.inner_serial.set(Box::new(current.clone()));
    let up = inner.actual_subscribe(Box::new(InnerObserver {
      shared: self.shared.clone(),
      id,
    }));
    current.set(up);
  }

  fn error(&mut self, err: RxError) {
    self.shared.sink.forward_error(err);
    self.shared.inner_serial.unsubscribe();
  }

  fn complete(&mut self) {
    let finished = {
      let mut data = self.shared.data.lock().unwrap();
      data.outer_done = true;
      !data.inner_active
    };
    if finished {
      self.shared.sink.forward_complete();
    }
  }

  fn is_closed(&self) -> bool { self.shared.sink.is_stopped() }
}

struct InnerObserver<Item> {
  shared: Arc<SwitchShared<Item>>,
  id: u64,
}

impl<Item: Send + 'static> Observer<Item> for InnerObserver<Item> {
  fn next(&mut self, value: Item) {
    let data = self.shared.data.lock().unwrap();
    if data.latest_id != self.id {
      return;
    }
    drop(data);
    self.shared.sink.forward_next(value);
  }

  fn error(&mut self, err: RxError) {
    let latest = self.shared.data.lock().unwrap().latest_id == self.id;
    if latest {
      self.shared.sink.forward_error(err);
      self.shared.inner_serial.unsubscribe();
    }
  }

  fn complete(&mut self) {
    let finished = {
      let mut data = self.shared.data.lock().unwrap();
      if data.latest_id != self.id {
        return;
      }
      data.inner_active = false;
      data.outer_done
    };
    // completion is deferred until outer and the latest inner are both done
    if finished {
      self.shared.sink.forward_complete();
    }
  }

  fn is_closed(&self) -> bool { self.shared.sink.is_stopped() }
}

pub(crate) fn switch_on_next<Item: Send + 'static>(
  source: Observable<Observable<Item>>,
) -> Observable<Item> {
  Observable::new(SwitchOp { source })
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{observable::from_iter, subject::PublishSubject};

  #[test]
  fn base_function() {
    let mut outer: PublishSubject<Observable<i32>> = PublishSubject::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (e1, e2) = (events.clone(), events.clone());
    outer.observable().switch_on_next().subscribe_all(
      move |v| e1.lock().unwrap().push(format!("next({v})")),
      |_| {},
      move || e2.lock().unwrap().push("complete".to_owned()),
    );
    outer.next(from_iter(0..3));
    assert_eq!(
      *events.lock().unwrap(),
      vec!["next(0)", "next(1)", "next(2)"]
    );
    outer.next(from_iter(10..12));
    outer.complete();
    assert_eq!(
      *events.lock().unwrap(),
      vec!["next(0)", "next(1)", "next(2)", "next(10)", "next(11)", "complete"]
    );
  }

  #[test]
  fn superseded_inner_values_are_dropped() {
    let mut outer: PublishSubject<Observable<&'static str>> =
      PublishSubject::new();
    let mut a = PublishSubject::new();
    let mut b = PublishSubject::new();
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = got.clone();
    outer
      .observable()
      .switch_on_next()
      .subscribe(move |v| g.lock().unwrap().push(v));

    outer.next(a.observable());
    a.next("a1");
    outer.next(b.observable());
    // A was superseded; its late value must not appear downstream
    a.next("a2");
    b.next("b1");
    assert_eq!(*got.lock().unwrap(), vec!["a1", "b1"]);
  }

  #[test]
  fn completion_waits_for_latest_inner() {
    let mut outer: PublishSubject<Observable<i32>> = PublishSubject::new();
    let mut inner = PublishSubject::new();
    let completed = Arc::new(Mutex::new(false));
    let c = completed.clone();
    outer.observable().switch_on_next().subscribe_all(
      |_| {},
      |_| {},
      move || *c.lock().unwrap() = true,
    );
    outer.next(inner.observable());
    outer.complete();
    assert!(!*completed.lock().unwrap());
    inner.next(5);
    inner.complete();
    assert!(*completed.lock().unwrap());
  }

  #[test]
  fn superseded_inner_subscription_is_released() {
    let mut outer: PublishSubject<Observable<i32>> = PublishSubject::new();
    let a = PublishSubject::new();
    let b = PublishSubject::new();
    let sub = outer
      .observable()
      .switch_on_next()
      .subscribe(|_| {});
    outer.next(a.observable());
    outer.next(b.observable());
    // a's subscriber list was drained when it was superseded
    assert!(!a.is_terminated());
    sub.unsubscribe();
    drop(b);
  }
}
