//! Scheduler abstraction: "schedule work, get a cancellation handle".
//!
//! The engine consumes schedulers only through this interface; the returned
//! handle must reliably prevent a not-yet-started task from ever running.
//! Three implementations are provided: a thread-per-task scheduler, a
//! futures thread-pool scheduler, and a deterministic virtual-time scheduler
//! for tests.

use std::sync::Arc;

pub use std::time::{Duration, Instant};

use crate::subscription::BoxSubscription;

pub mod new_thread;
pub mod test_scheduler;
pub mod thread_pool;

pub use new_thread::NewThreadScheduler;
pub use test_scheduler::TestScheduler;
pub use thread_pool::ThreadPoolScheduler;

/// A Scheduler is an object to order tasks and schedule their execution.
pub trait Scheduler: Send + Sync {
  /// The scheduler's notion of "now", used for elapsed-time computations.
  fn now(&self) -> Instant;

  /// Runs `task` once, after `delay` if given. The returned handle cancels
  /// the task if released before it fires.
  fn schedule(
    &self,
    delay: Option<Duration>,
    task: Box<dyn FnOnce() + Send>,
  ) -> BoxSubscription;

  /// Runs `task` every `period` until the returned handle is released.
  fn schedule_periodic(
    &self,
    period: Duration,
    task: Box<dyn FnMut() + Send>,
  ) -> BoxSubscription;
}

/// Shared scheduler handle, the form operators hold.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// A thread-per-task scheduler instance.
pub fn new_thread() -> SharedScheduler { Arc::new(NewThreadScheduler) }

/// A futures thread-pool backed scheduler instance.
pub fn thread_pool() -> SharedScheduler { Arc::new(ThreadPoolScheduler::new()) }
