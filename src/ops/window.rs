//! Partitioning a stream into consecutive sub-streams ("windows").
//!
//! Boundaries are driven by element count, scheduler time, a
//! count-or-time combination, or an external boundary stream. Windows are
//! handed downstream as observables backed by per-window subjects.
//!
//! Shared-lifetime rule: the upstream subscription (and any timer) is
//! released only once the outer subscription has been closed *and* every
//! still-open window has completed or been independently unsubscribed; the
//! ref-counted subscription models exactly that. Boundary rotation for the
//! timed variants runs under the async lock so a timer tick and an upstream
//! value never rotate concurrently.

use std::sync::{Arc, Mutex};

use crate::{
  async_lock::AsyncLock,
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  scheduler::{Duration, SharedScheduler},
  sink::Sink,
  subject::PublishSubject,
  subscription::{
    BoxSubscription, CompositeSubscription, RefCountHandle,
    RefCountSubscription, SerialSubscription, SingleSubscription, Subscription,
  },
};

// ==================== ref-counted window hand-off ====================

/// The observable handed downstream for each window: subscribing acquires a
/// dependent handle on the shared teardown, released when the window
/// terminates or its consumer unsubscribes.
struct AddRefObservable<Item> {
  window: Observable<Item>,
  refcount: RefCountSubscription,
}

impl<Item: Send + 'static> CoreObservable<Item> for AddRefObservable<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let dep = Arc::new(self.refcount.acquire());
    let sub = self.window.actual_subscribe(Box::new(ReleaseObserver {
      inner: observer,
      dep: dep.clone(),
    }));
    let handle = CompositeSubscription::new();
    handle.add(sub);
    handle.add(Box::new(dep));
    Box::new(handle)
  }
}

struct ReleaseObserver<Item> {
  inner: BoxedObserver<Item>,
  dep: Arc<RefCountHandle>,
}

impl<Item> Observer<Item> for ReleaseObserver<Item> {
  fn next(&mut self, value: Item) { self.inner.next(value) }

  fn error(&mut self, err: RxError) {
    self.inner.error(err);
    self.dep.unsubscribe();
  }

  fn complete(&mut self) {
    self.inner.complete();
    self.dep.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.inner.is_closed() }
}

fn add_ref<Item: Send + 'static>(
  window: Observable<Item>,
  refcount: &RefCountSubscription,
) -> Observable<Item> {
  Observable::new(AddRefObservable { window, refcount: refcount.clone() })
}

// ==================== count windows ====================

struct WindowCountOp<Item> {
  source: Observable<Item>,
  count: usize,
}

impl<Item> CoreObservable<Observable<Item>> for WindowCountOp<Item>
where
  Item: Clone + Send + 'static,
{
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<Observable<Item>>,
  ) -> BoxSubscription {
    let sink = Sink::new(observer);
    let upstream = SingleSubscription::new();
    let refcount = RefCountSubscription::new(Box::new(upstream.clone()));
    sink.set_upstream(Box::new(refcount.clone()));

    let first = PublishSubject::new();
    sink.forward_next(add_ref(first.observable(), &refcount));
    let size = self.count.max(1);
    let up = self.source.actual_subscribe(Box::new(WindowCountObserver {
      sink: sink.clone(),
      refcount,
      subject: first,
      remaining: size,
      size,
    }));
    upstream.set(up);
    sink.handle()
  }
}

struct WindowCountObserver<Item> {
  sink: Sink<Observable<Item>>,
  refcount: RefCountSubscription,
  subject: PublishSubject<Item>,
  remaining: usize,
  size: usize,
}

impl<Item: Clone + Send + 'static> Observer<Item> for WindowCountObserver<Item> {
  fn next(&mut self, value: Item) {
    self.subject.next(value);
    self.remaining -= 1;
    if self.remaining == 0 {
      self.subject.complete();
      self.subject = PublishSubject::new();
      self.remaining = self.size;
      self
        .sink
        .forward_next(add_ref(self.subject.observable(), &self.refcount));
    }
  }

  fn error(&mut self, err: RxError) {
    self.subject.error(err.clone());
    self.sink.forward_error(err);
  }

  fn complete(&mut self) {
    self.subject.complete();
    self.sink.forward_complete();
  }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn window_count<Item: Clone + Send + 'static>(
  source: Observable<Item>,
  count: usize,
) -> Observable<Observable<Item>> {
  Observable::new(WindowCountOp { source, count })
}

// ==================== timed windows ====================

struct TimedState<Item> {
  subject: PublishSubject<Item>,
  seen: usize,
  generation: u64,
}

struct TimedShared<Item> {
  sink: Sink<Observable<Item>>,
  lock: AsyncLock,
  state: Mutex<TimedState<Item>>,
  refcount: RefCountSubscription,
  timer_serial: SerialSubscription,
  scheduler: SharedScheduler,
}

impl<Item: Clone + Send + 'static> TimedShared<Item> {
  /// Closes the current window and opens the next. Must run under the
  /// async lock.
  fn rotate(self: &Arc<Self>) {
    if self.sink.is_closed() {
      return;
    }
    let (mut old, new_window) = {
      let mut st = self.state.lock().unwrap();
      let old = std::mem::replace(&mut st.subject, PublishSubject::new());
      st.seen = 0;
      st.generation += 1;
      (old, st.subject.observable())
    };
    old.complete();
    self.sink.forward_next(add_ref(new_window, &self.refcount));
  }

  fn terminate(self: &Arc<Self>, err: Option<RxError>) {
    let mut subject = self.state.lock().unwrap().subject.clone();
    match err {
      Some(err) => {
        subject.error(err.clone());
        self.sink.forward_error(err);
      }
      None => {
        subject.complete();
        self.sink.forward_complete();
      }
    }
  }

  /// Arms a one-shot boundary timer for the current window generation. A
  /// tick that arrives after a count-driven rotation finds its generation
  /// stale and does nothing: count wins, the timer restarts.
  fn arm_timer(self: &Arc<Self>, span: Duration) {
    let gen = self.state.lock().unwrap().generation;
    let shared = self.clone();
    let handle = self.scheduler.schedule(
      Some(span),
      Box::new(move || {
        let inner = shared.clone();
        shared.lock.wait(move || {
          if inner.state.lock().unwrap().generation == gen {
            inner.rotate();
            inner.arm_timer(span);
          }
        });
      }),
    );
    self.timer_serial.set(handle);
  }
}

fn timed_shared<Item: Clone + Send + 'static>(
  observer: BoxedObserver<Observable<Item>>,
  scheduler: SharedScheduler,
) -> (Arc<TimedShared<Item>>, SingleSubscription, CompositeSubscription) {
  let sink = Sink::new(observer);
  let upstream = SingleSubscription::new();
  let group = CompositeSubscription::new();
  group.add(Box::new(upstream.clone()));
  let timer_serial = SerialSubscription::new();
  group.add(Box::new(timer_serial.clone()));
  let refcount = RefCountSubscription::new(Box::new(group.clone()));
  sink.set_upstream(Box::new(refcount.clone()));

  let first = PublishSubject::new();
  sink.forward_next(add_ref(first.observable(), &refcount));
  let shared = Arc::new(TimedShared {
    sink,
    lock: AsyncLock::new(),
    state: Mutex::new(TimedState { subject: first, seen: 0, generation: 0 }),
    refcount,
    timer_serial,
    scheduler,
  });
  (shared, upstream, group)
}

/// Upstream observer shared by the timed variants; `count` of `usize::MAX`
/// means "time only".
struct TimedObserver<Item> {
  shared: Arc<TimedShared<Item>>,
  count: usize,
  span: Option<Duration>,
}

impl<Item: Clone + Send + 'static> Observer<Item> for TimedObserver<Item> {
  fn next(&mut self, value: Item) {
    let shared = self.shared.clone();
    let count = self.count;
    let span = self.span;
    self.shared.lock.wait(move || {
      let (mut subject, rotate_now) = {
        let mut st = shared.state.lock().unwrap();
        st.seen += 1;
        (st.subject.clone(), st.seen >= count)
      };
      subject.next(value);
      if rotate_now {
        shared.rotate();
        if let Some(span) = span {
          // count won the boundary; restart the timer for the new window
          shared.arm_timer(span);
        }
      }
    });
  }

  fn error(&mut self, err: RxError) {
    let shared = self.shared.clone();
    self.shared.lock.wait(move || shared.terminate(Some(err)));
  }

  fn complete(&mut self) {
    let shared = self.shared.clone();
    self.shared.lock.wait(move || shared.terminate(None));
  }

  fn is_closed(&self) -> bool { self.shared.sink.is_stopped() }
}

struct WindowTimeOp<Item> {
  source: Observable<Item>,
  span: Duration,
  scheduler: SharedScheduler,
}

impl<Item> CoreObservable<Observable<Item>> for WindowTimeOp<Item>
where
  Item: Clone + Send + 'static,
{
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<Observable<Item>>,
  ) -> BoxSubscription {
    let (shared, upstream, _group) =
      timed_shared(observer, self.scheduler.clone());
    let tick_target = shared.clone();
    let handle = self.scheduler.schedule_periodic(
      self.span,
      Box::new(move || {
        let shared = tick_target.clone();
        tick_target.lock.wait(move || shared.rotate());
      }),
    );
    shared.timer_serial.set(handle);

    let up = self.source.actual_subscribe(Box::new(TimedObserver {
      shared: shared.clone(),
      count: usize::MAX,
      span: None,
    }));
    upstream.set(up);
    shared.sink.handle()
  }
}

pub(crate) fn window_time<Item: Clone + Send + 'static>(
  source: Observable<Item>,
  span: Duration,
  scheduler: SharedScheduler,
) -> Observable<Observable<Item>> {
  Observable::new(WindowTimeOp { source, span, scheduler })
}

struct WindowCountOrTimeOp<Item> {
  source: Observable<Item>,
  count: usize,
  span: Duration,
  scheduler: SharedScheduler,
}

impl<Item> CoreObservable<Observable<Item>> for WindowCountOrTimeOp<Item>
where
  Item: Clone + Send + 'static,
{
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<Observable<Item>>,
  ) -> BoxSubscription {
    let (shared, upstream, _group) =
      timed_shared(observer, self.scheduler.clone());
    shared.arm_timer(self.span);

    let up = self.source.actual_subscribe(Box::new(TimedObserver {
      shared: shared.clone(),
      count: self.count.max(1),
      span: Some(self.span),
    }));
    upstream.set(up);
    shared.sink.handle()
  }
}

pub(crate) fn window_count_or_time<Item: Clone + Send + 'static>(
  source: Observable<Item>,
  count: usize,
  span: Duration,
  scheduler: SharedScheduler,
) -> Observable<Observable<Item>> {
  Observable::new(WindowCountOrTimeOp { source, count, span, scheduler })
}

// ==================== boundary windows ====================

struct WindowBoundaryOp<Item, B> {
  source: Observable<Item>,
  boundary: Observable<B>,
}

impl<Item, B> CoreObservable<Observable<Item>> for WindowBoundaryOp<Item, B>
where
  Item: Clone + Send + 'static,
  B: Send + 'static,
{
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<Observable<Item>>,
  ) -> BoxSubscription {
    let (shared, upstream, group) =
      timed_shared(observer, crate::scheduler::new_thread());
    let boundary_single = SingleSubscription::new();
    group.add(Box::new(boundary_single.clone()));

    let b = self.boundary.actual_subscribe(Box::new(BoundaryObserver {
      shared: shared.clone(),
      _marker: std::marker::PhantomData,
    }));
    boundary_single.set(b);

    let up = self.source.actual_subscribe(Box::new(TimedObserver {
      shared: shared.clone(),
      count: usize::MAX,
      span: None,
    }));
    upstream.set(up);
    shared.sink.handle()
  }
}

struct BoundaryObserver<Item, B> {
  shared: Arc<TimedShared<Item>>,
  _marker: std::marker::PhantomData<fn(B)>,
}

impl<Item, B> Observer<B> for BoundaryObserver<Item, B>
where
  Item: Clone + Send + 'static,
{
  fn next(&mut self, _boundary: B) {
    let shared = self.shared.clone();
    self.shared.lock.wait(move || shared.rotate());
  }

  fn error(&mut self, err: RxError) {
    let shared = self.shared.clone();
    self.shared.lock.wait(move || shared.terminate(Some(err)));
  }

  fn complete(&mut self) {
    let shared = self.shared.clone();
    self.shared.lock.wait(move || shared.terminate(None));
  }

  fn is_closed(&self) -> bool { self.shared.sink.is_stopped() }
}

pub(crate) fn window_boundary<Item, B>(
  source: Observable<Item>,
  boundary: Observable<B>,
) -> Observable<Observable<Item>>
where
  Item: Clone + Send + 'static,
  B: Send + 'static,
{
  Observable::new(WindowBoundaryOp { source, boundary })
}
