//! Scheduler-driven sources.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  scheduler::{Duration, SharedScheduler},
  sink::Sink,
  subscription::BoxSubscription,
};

struct Timer {
  delay: Duration,
  scheduler: SharedScheduler,
}

impl CoreObservable<()> for Timer {
  fn actual_subscribe(&self, observer: BoxedObserver<()>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let delivery = sink.clone();
    let handle = self.scheduler.schedule(
      Some(self.delay),
      Box::new(move || {
        delivery.forward_next(());
        delivery.forward_complete();
      }),
    );
    sink.set_upstream(handle);
    sink.handle()
  }
}

/// Emits one `()` after `delay` on `scheduler`, then completes.
/// Unsubscribing before the due time cancels the scheduled work.
pub fn timer(delay: Duration, scheduler: SharedScheduler) -> Observable<()> {
  Observable::new(Timer { delay, scheduler })
}

struct Interval {
  period: Duration,
  scheduler: SharedScheduler,
}

impl CoreObservable<usize> for Interval {
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<usize>,
  ) -> BoxSubscription {
    let sink = Sink::new(observer);
    let delivery = sink.clone();
    let tick = AtomicUsize::new(0);
    let handle = self.scheduler.schedule_periodic(
      self.period,
      Box::new(move || {
        delivery.forward_next(tick.fetch_add(1, Ordering::Relaxed));
      }),
    );
    sink.set_upstream(handle);
    sink.handle()
  }
}

/// Emits 0, 1, 2, ... every `period` on `scheduler` until unsubscribed.
pub fn interval(
  period: Duration,
  scheduler: SharedScheduler,
) -> Observable<usize> {
  Observable::new(Interval { period, scheduler })
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{scheduler::TestScheduler, subscription::Subscription};

  #[test]
  fn timer_fires_once_at_due_time() {
    TestScheduler::reset();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (e1, e2) = (events.clone(), events.clone());
    timer(Duration::from_millis(10), Arc::new(TestScheduler)).subscribe_all(
      move |_| e1.lock().unwrap().push("next"),
      |_| {},
      move || e2.lock().unwrap().push("complete"),
    );
    TestScheduler::advance_by(Duration::from_millis(9));
    assert!(events.lock().unwrap().is_empty());
    TestScheduler::advance_by(Duration::from_millis(1));
    assert_eq!(*events.lock().unwrap(), vec!["next", "complete"]);
  }

  #[test]
  fn timer_unsubscribed_before_due_never_fires() {
    TestScheduler::reset();
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = events.clone();
    let sub = timer(Duration::from_millis(10), Arc::new(TestScheduler))
      .subscribe(move |_| e.lock().unwrap().push("next"));
    sub.unsubscribe();
    TestScheduler::advance_by(Duration::from_millis(20));
    assert!(events.lock().unwrap().is_empty());
  }

  #[test]
  fn interval_counts_ticks() {
    TestScheduler::reset();
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = got.clone();
    let sub = interval(Duration::from_millis(10), Arc::new(TestScheduler))
      .subscribe(move |v| g.lock().unwrap().push(v));
    TestScheduler::advance_by(Duration::from_millis(35));
    assert_eq!(*got.lock().unwrap(), vec![0, 1, 2]);
    sub.unsubscribe();
    TestScheduler::advance_by(Duration::from_millis(35));
    assert_eq!(*got.lock().unwrap(), vec![0, 1, 2]);
  }
}
