//! Concurrent flattening with an optional concurrency cap.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::{
  error::RxError,
  observable::{from_iter, CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::{
    BoxSubscription, CompositeKey, CompositeSubscription, SingleSubscription,
    Subscription,
  },
};

struct MergeAllOp<Item> {
  source: Observable<Observable<Item>>,
  concurrent: usize,
}

impl<Item: Send + 'static> CoreObservable<Item> for MergeAllOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let shared = Arc::new(MergeShared {
      sink: sink.clone(),
      // coarse forwarding gate: merged values are serialized, not raced
      gate: Mutex::new(()),
      data: Mutex::new(MergeData {
        queue: VecDeque::new(),
        active: 0,
        outer_done: false,
      }),
      subscriptions: CompositeSubscription::new(),
      concurrent: self.concurrent.max(1),
    });

    let outer = SingleSubscription::new();
    shared.subscriptions.add(Box::new(outer.clone()));
    sink.set_upstream(Box::new(MergeTeardown { shared: shared.clone() }));

    let up = self
      .source
      .actual_subscribe(Box::new(OuterObserver { shared }));
    outer.set(up);
    sink.handle()
  }
}

struct MergeData<Item> {
  queue: VecDeque<Observable<Item>>,
  active: usize,
  outer_done: bool,
}

struct MergeShared<Item> {
  sink: Sink<Item>,
  gate: Mutex<()>,
  data: Mutex<MergeData<Item>>,
  subscriptions: CompositeSubscription,
  concurrent: usize,
}

impl<Item: Send + 'static> MergeShared<Item> {
  fn subscribe_inner(self: &Arc<Self>, inner: Observable<Item>) {
    if self.sink.is_closed() {
      return;
    }
    // the single-assignment handle goes into the composite first so the
    // inner observer knows its O(1) removal key
    let current = SingleSubscription::new();
    let key = self.subscriptions.add(Box::new(current.clone()));
    let up = inner.actual_subscribe(Box::new(InnerObserver {
      shared: self.clone(),
      key,
    }));
    current.set(up);
  }

  fn forward_error(&self, err: RxError) {
    {
      let _gate = self.gate.lock().unwrap();
      self.sink.forward_error(err);
    }
    self.data.lock().unwrap().queue.clear();
    self.subscriptions.unsubscribe();
  }
}

struct OuterObserver<Item> {
  shared: Arc<MergeShared<Item>>,
}

impl<Item: Send + 'static> Observer<Observable<Item>> for OuterObserver<Item> {
  fn next(&mut self, inner: Observable<Item>) {
    let to_subscribe = {
      let mut data = self.shared.data.lock().unwrap();
      if data.active < self.shared.concurrent {
        data.active += 1;
        Some(inner)
      } else {
        data.queue.push_back(inner);
        None
      }
    };
    // subscribing outside the data lock: a synchronous inner may complete
    // (and pop the queue) reentrantly
    if let Some(inner) = to_subscribe {
      self.shared.subscribe_inner(inner);
    }
  }

  fn error(&mut self, err: RxError) { self.shared.forward_error(err); }

  fn complete(&mut self) {
    let finished = {
      let mut data = self.shared.data.lock().unwrap();
      data.outer_done = true;
      data.active == 0 && data.queue.is_empty()
    };
    if finished {
      let _gate = self.shared.gate.lock().unwrap();
      self.shared.sink.forward_complete();
    }
  }

  fn is_closed(&self) -> bool { self.shared.sink.is_stopped() }
}

struct InnerObserver<Item> {
  shared: Arc<MergeShared<Item>>,
  key: CompositeKey,
}

impl<Item: Send + 'static> Observer<Item> for InnerObserver<Item> {
  fn next(&mut self, value: Item) {
    let _gate = self.shared.gate.lock().unwrap();
    self.shared.sink.forward_next(value);
  }

  fn error(&mut self, err: RxError) { self.shared.forward_error(err); }

  fn complete(&mut self) {
    self.shared.subscriptions.remove(self.key);
    let next_step = {
      let mut data = self.shared.data.lock().unwrap();
      match data.queue.pop_front() {
        // the freed slot goes to the first pending source; active is
        // unchanged
        Some(pending) => Step::Subscribe(pending),
        None => {
          data.active -= 1;
          if data.active == 0 && data.outer_done {
            Step::Complete
          } else {
            Step::Idle
          }
        }
      }
    };
    match next_step {
      Step::Subscribe(pending) => self.shared.subscribe_inner(pending),
      Step::Complete => {
        let _gate = self.shared.gate.lock().unwrap();
        self.shared.sink.forward_complete();
      }
      Step::Idle => {}
    }
  }

  fn is_closed(&self) -> bool { self.shared.sink.is_stopped() }
}

enum Step<Item> {
  Subscribe(Observable<Item>),
  Complete,
  Idle,
}

/// Unsubscribing the merge clears pending sources (they must never start)
/// before releasing the outer and every active inner subscription.
struct MergeTeardown<Item> {
  shared: Arc<MergeShared<Item>>,
}

impl<Item> Subscription for MergeTeardown<Item> {
  fn unsubscribe(&self) {
    self.shared.data.lock().unwrap().queue.clear();
    self.shared.subscriptions.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.shared.subscriptions.is_closed() }
}

pub(crate) fn merge_all<Item: Send + 'static>(
  source: Observable<Observable<Item>>,
  concurrent: usize,
) -> Observable<Item> {
  Observable::new(MergeAllOp { source, concurrent })
}

pub(crate) fn merge<Item: Send + 'static>(
  a: Observable<Item>,
  b: Observable<Item>,
) -> Observable<Item> {
  merge_all(from_iter(vec![a, b]), usize::MAX)
}
