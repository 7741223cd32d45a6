//! Scheduler that creates a new thread for each unit of work.

use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{channel, RecvTimeoutError},
    Arc,
  },
  thread,
};

use crate::{
  scheduler::{Duration, Instant, Scheduler},
  subscription::{BoxSubscription, FnSubscription},
};

/// Thread-per-task scheduler. Delays are waited out on the worker thread
/// with a cancellable timed receive, so releasing the handle wakes and
/// retires the worker immediately.
#[derive(Clone, Copy, Default)]
pub struct NewThreadScheduler;

impl Scheduler for NewThreadScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule(
    &self,
    delay: Option<Duration>,
    task: Box<dyn FnOnce() + Send>,
  ) -> BoxSubscription {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    let (tx, rx) = channel::<()>();
    thread::spawn(move || {
      if let Some(delay) = delay {
        let start = Instant::now();
        match rx.recv_timeout(delay) {
          // a message means "cancelled": wake up and retire
          Ok(()) => return,
          Err(RecvTimeoutError::Timeout) => {}
          // the handle was dropped without cancelling; finish the wait
          Err(RecvTimeoutError::Disconnected) => {
            thread::sleep(delay.saturating_sub(start.elapsed()));
          }
        }
      }
      if !flag.load(Ordering::Acquire) {
        task();
      }
    });
    Box::new(FnSubscription::new(move || {
      cancelled.store(true, Ordering::Release);
      let _ = tx.send(());
    }))
  }

  fn schedule_periodic(
    &self,
    period: Duration,
    mut task: Box<dyn FnMut() + Send>,
  ) -> BoxSubscription {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    let (tx, rx) = channel::<()>();
    thread::spawn(move || loop {
      let start = Instant::now();
      match rx.recv_timeout(period) {
        Ok(()) => return,
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => {
          thread::sleep(period.saturating_sub(start.elapsed()));
        }
      }
      if flag.load(Ordering::Acquire) {
        return;
      }
      task();
    });
    Box::new(FnSubscription::new(move || {
      cancelled.store(true, Ordering::Release);
      let _ = tx.send(());
    }))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::subscription::Subscription;

  #[test]
  fn runs_scheduled_task() {
    let (tx, rx) = channel();
    NewThreadScheduler.schedule(
      None,
      Box::new(move || {
        tx.send(42).unwrap();
      }),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
  }

  #[test]
  fn released_handle_prevents_the_task() {
    let ran = Arc::new(Mutex::new(false));
    let r = ran.clone();
    let handle = NewThreadScheduler.schedule(
      Some(Duration::from_millis(200)),
      Box::new(move || {
        *r.lock().unwrap() = true;
      }),
    );
    handle.unsubscribe();
    thread::sleep(Duration::from_millis(400));
    assert!(!*ran.lock().unwrap());
  }

  #[test]
  fn periodic_ticks_until_released() {
    let (tx, rx) = channel();
    let handle = NewThreadScheduler.schedule_periodic(
      Duration::from_millis(10),
      Box::new(move || {
        let _ = tx.send(());
      }),
    );
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.unsubscribe();
  }
}
