use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::{BoxSubscription, Subscription},
};

struct FinalizeOp<Item, F> {
  source: Observable<Item>,
  func: Arc<F>,
}

/// Per-subscription once-guard around the shared finalize closure.
struct Hook<F> {
  func: Arc<F>,
  fired: AtomicBool,
}

impl<F: Fn()> Hook<F> {
  fn call_once(&self) {
    if !self.fired.swap(true, Ordering::AcqRel) {
      (self.func)();
    }
  }
}

impl<Item, F> CoreObservable<Item> for FinalizeOp<Item, F>
where
  Item: Send + 'static,
  F: Fn() + Send + Sync + 'static,
{
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let hook = Arc::new(Hook {
      func: self.func.clone(),
      fired: AtomicBool::new(false),
    });
    let up = self.source.actual_subscribe(Box::new(FinalizeObserver {
      sink: sink.clone(),
      hook: hook.clone(),
    }));
    sink.set_upstream(up);
    Box::new(FinalizeHandle { sink, hook })
  }
}

struct FinalizeObserver<Item, F> {
  sink: Sink<Item>,
  hook: Arc<Hook<F>>,
}

impl<Item, F: Fn()> Observer<Item> for FinalizeObserver<Item, F> {
  fn next(&mut self, value: Item) { self.sink.forward_next(value) }

  fn error(&mut self, err: RxError) {
    self.sink.forward_error(err);
    self.hook.call_once();
  }

  fn complete(&mut self) {
    self.sink.forward_complete();
    self.hook.call_once();
  }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

struct FinalizeHandle<Item, F> {
  sink: Sink<Item>,
  hook: Arc<Hook<F>>,
}

impl<Item, F: Fn()> Subscription for FinalizeHandle<Item, F> {
  fn unsubscribe(&self) {
    self.sink.unsubscribe();
    self.hook.call_once();
  }

  fn is_closed(&self) -> bool { self.sink.is_closed() }
}

pub(crate) fn finalize<Item, F>(
  source: Observable<Item>,
  func: F,
) -> Observable<Item>
where
  Item: Send + 'static,
  F: Fn() + Send + Sync + 'static,
{
  Observable::new(FinalizeOp { source, func: Arc::new(func) })
}

#[cfg(test)]
mod tests {
  use std::sync::{atomic::AtomicUsize, Mutex};

  use super::*;
  use crate::observable::{from_iter, never};

  #[test]
  fn runs_after_completion() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (o1, o2) = (order.clone(), order.clone());
    from_iter(0..2)
      .finalize(move || o1.lock().unwrap().push("finalize".to_owned()))
      .subscribe_all(
        |_| {},
        |_| {},
        move || o2.lock().unwrap().push("complete".to_owned()),
      );
    // finalize runs after the completion has been forwarded
    assert_eq!(*order.lock().unwrap(), vec!["complete", "finalize"]);
  }

  #[test]
  fn runs_once_on_unsubscribe() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let sub = never::<i32>()
      .finalize(move || {
        h.fetch_add(1, Ordering::SeqCst);
      })
      .subscribe(|_| {});
    sub.unsubscribe();
    sub.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn each_subscription_finalizes_independently() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let source = from_iter(0..1).finalize(move || {
      h.fetch_add(1, Ordering::SeqCst);
    });
    source.subscribe(|_| {});
    source.subscribe(|_| {});
    assert_eq!(hits.load(Ordering::SeqCst), 2);
  }
}
