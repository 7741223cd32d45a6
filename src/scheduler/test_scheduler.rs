//! Virtual-time scheduler for deterministic testing of time-based
//! operators.
//!
//! Time only advances when explicitly instructed, and tasks execute
//! synchronously on the advancing thread. State is thread-local, so each
//! test thread has its own independent virtual time and task queue.

use std::{
  cell::RefCell,
  cmp::Ordering as CmpOrdering,
  collections::BinaryHeap,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use crate::{
  scheduler::{Duration, Instant, Scheduler},
  subscription::{BoxSubscription, FnSubscription},
};

struct ScheduledTask {
  due: Duration,
  task_id: usize,
  task: Box<dyn FnOnce() + Send>,
  cancelled: Arc<AtomicBool>,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool {
    self.due == other.due && self.task_id == other.task_id
  }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
    Some(self.cmp(other))
  }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> CmpOrdering {
    // min-heap: earlier times first, then FIFO by task id
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

#[derive(Default)]
struct TestSchedulerState {
  virtual_time: Duration,
  queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
}

thread_local! {
  static STATE: RefCell<TestSchedulerState> =
    RefCell::new(TestSchedulerState::default());
  static ANCHOR: Instant = Instant::now();
}

/// A virtual-time scheduler. Zero-sized; all instances on one thread share
/// the same virtual time and task queue.
#[derive(Clone, Copy, Default)]
pub struct TestScheduler;

impl TestScheduler {
  /// Clears the queue and rewinds virtual time. Call at the start of every
  /// test.
  pub fn reset() {
    STATE.with(|s| *s.borrow_mut() = TestSchedulerState::default());
  }

  /// Current virtual time, as elapsed duration since reset.
  pub fn virtual_time() -> Duration {
    STATE.with(|s| s.borrow().virtual_time)
  }

  fn push(
    due: Duration,
    task: Box<dyn FnOnce() + Send>,
    cancelled: Arc<AtomicBool>,
  ) {
    STATE.with(|s| {
      let mut state = s.borrow_mut();
      let task_id = state.next_task_id;
      state.next_task_id += 1;
      state.queue.push(ScheduledTask { due, task_id, task, cancelled });
    });
  }

  fn pop_due(limit: Duration) -> Option<ScheduledTask> {
    STATE.with(|s| {
      let mut state = s.borrow_mut();
      if state.queue.peek().is_some_and(|t| t.due <= limit) {
        let task = state.queue.pop().unwrap();
        state.virtual_time = state.virtual_time.max(task.due);
        Some(task)
      } else {
        None
      }
    })
  }

  /// Advances virtual time by `duration`, running every task that comes due
  /// (in due order, FIFO among equals). Tasks scheduled while advancing run
  /// too if they fall inside the window.
  pub fn advance_by(duration: Duration) {
    let target = Self::virtual_time() + duration;
    // pop-then-run without holding the state borrow: a running task may
    // schedule more tasks
    while let Some(t) = Self::pop_due(target) {
      if !t.cancelled.load(Ordering::Acquire) {
        (t.task)();
      }
    }
    STATE.with(|s| s.borrow_mut().virtual_time = target);
  }

  /// Runs every task due at the current virtual time, including tasks they
  /// schedule with zero delay.
  pub fn flush() { Self::advance_by(Duration::ZERO); }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Instant {
    ANCHOR.with(|a| *a) + Self::virtual_time()
  }

  fn schedule(
    &self,
    delay: Option<Duration>,
    task: Box<dyn FnOnce() + Send>,
  ) -> BoxSubscription {
    let cancelled = Arc::new(AtomicBool::new(false));
    let due = Self::virtual_time() + delay.unwrap_or(Duration::ZERO);
    Self::push(due, task, cancelled.clone());
    Box::new(FnSubscription::new(move || {
      cancelled.store(true, Ordering::Release);
    }))
  }

  fn schedule_periodic(
    &self,
    period: Duration,
    task: Box<dyn FnMut() + Send>,
  ) -> BoxSubscription {
    let cancelled = Arc::new(AtomicBool::new(false));
    tick(period, Arc::new(Mutex::new(task)), cancelled.clone());
    Box::new(FnSubscription::new(move || {
      cancelled.store(true, Ordering::Release);
    }))
  }
}

fn tick(
  period: Duration,
  task: Arc<Mutex<Box<dyn FnMut() + Send>>>,
  cancelled: Arc<AtomicBool>,
) {
  let due = TestScheduler::virtual_time() + period;
  let flag = cancelled.clone();
  TestScheduler::push(
    due,
    Box::new(move || {
      (task.lock().unwrap())();
      tick(period, task, flag);
    }),
    cancelled,
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription::Subscription;

  #[test]
  fn tasks_fire_in_virtual_order() {
    TestScheduler::reset();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (o1, o2) = (order.clone(), order.clone());
    let s = TestScheduler;
    s.schedule(
      Some(Duration::from_millis(20)),
      Box::new(move || o1.lock().unwrap().push("late")),
    );
    s.schedule(
      Some(Duration::from_millis(10)),
      Box::new(move || o2.lock().unwrap().push("early")),
    );
    assert!(order.lock().unwrap().is_empty());
    TestScheduler::advance_by(Duration::from_millis(15));
    assert_eq!(*order.lock().unwrap(), vec!["early"]);
    TestScheduler::advance_by(Duration::from_millis(5));
    assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
  }

  #[test]
  fn cancelled_task_never_fires() {
    TestScheduler::reset();
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    let handle = TestScheduler.schedule(
      Some(Duration::from_millis(5)),
      Box::new(move || *h.lock().unwrap() += 1),
    );
    handle.unsubscribe();
    TestScheduler::advance_by(Duration::from_millis(10));
    assert_eq!(*hits.lock().unwrap(), 0);
  }

  #[test]
  fn periodic_reschedules_until_cancelled() {
    TestScheduler::reset();
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    let handle = TestScheduler.schedule_periodic(
      Duration::from_millis(10),
      Box::new(move || *h.lock().unwrap() += 1),
    );
    TestScheduler::advance_by(Duration::from_millis(35));
    assert_eq!(*hits.lock().unwrap(), 3);
    handle.unsubscribe();
    TestScheduler::advance_by(Duration::from_millis(30));
    assert_eq!(*hits.lock().unwrap(), 3);
  }
}
