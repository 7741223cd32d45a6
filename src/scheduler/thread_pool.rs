//! Scheduler backed by the futures thread pool.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use futures::executor::ThreadPool;

use crate::{
  scheduler::{Duration, Instant, Scheduler},
  subscription::{BoxSubscription, FnSubscription},
};

/// Pool-backed scheduler; delayed and periodic work awaits a timer future on
/// a pool worker instead of parking a dedicated thread.
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

impl ThreadPoolScheduler {
  pub fn new() -> Self {
    ThreadPoolScheduler {
      pool: ThreadPool::new().expect("spawn thread pool failed."),
    }
  }
}

impl Default for ThreadPoolScheduler {
  fn default() -> Self { Self::new() }
}

fn cancel_handle(cancelled: Arc<AtomicBool>) -> BoxSubscription {
  Box::new(FnSubscription::new(move || {
    cancelled.store(true, Ordering::Release);
  }))
}

impl Scheduler for ThreadPoolScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule(
    &self,
    delay: Option<Duration>,
    task: Box<dyn FnOnce() + Send>,
  ) -> BoxSubscription {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    self.pool.spawn_ok(async move {
      if let Some(delay) = delay {
        futures_time::task::sleep(delay.into()).await;
      }
      if !flag.load(Ordering::Acquire) {
        task();
      }
    });
    cancel_handle(cancelled)
  }

  fn schedule_periodic(
    &self,
    period: Duration,
    mut task: Box<dyn FnMut() + Send>,
  ) -> BoxSubscription {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    self.pool.spawn_ok(async move {
      loop {
        futures_time::task::sleep(period.into()).await;
        if flag.load(Ordering::Acquire) {
          return;
        }
        task();
      }
    });
    cancel_handle(cancelled)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;

  use super::*;
  use crate::subscription::Subscription;

  #[test]
  fn runs_on_the_pool() {
    let scheduler = ThreadPoolScheduler::new();
    let (tx, rx) = channel();
    scheduler.schedule(
      None,
      Box::new(move || {
        tx.send(7).unwrap();
      }),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
  }

  #[test]
  fn cancelled_delay_never_fires() {
    let scheduler = ThreadPoolScheduler::new();
    let (tx, rx) = channel();
    let handle = scheduler.schedule(
      Some(Duration::from_millis(100)),
      Box::new(move || {
        let _ = tx.send(());
      }),
    );
    handle.unsubscribe();
    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
  }
}
