//! Cross-component properties of the engine, exercised through the public
//! surface.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};
use std::thread;

use rxcore::observer::AllObserver;
use rxcore::prelude::*;

#[derive(Debug, Clone, PartialEq)]
enum Event {
  Next(i32),
  Error(String),
  Complete,
}

fn recording_observer(
  events: &Arc<Mutex<Vec<Event>>>,
) -> BoxedObserver<i32> {
  let (e1, e2, e3) = (events.clone(), events.clone(), events.clone());
  Box::new(AllObserver {
    next: move |v| e1.lock().unwrap().push(Event::Next(v)),
    error: move |e: RxError| {
      e2.lock().unwrap().push(Event::Error(e.to_string()))
    },
    complete: move || e3.lock().unwrap().push(Event::Complete),
  })
}

// ==================== half-serializer stress ====================

#[test]
fn concurrent_producers_one_terminal() {
  const PRODUCERS: usize = 8;
  const PER_PRODUCER: usize = 1000;

  let events = Arc::new(Mutex::new(Vec::new()));
  let serializer =
    HalfSerializer::new(Sink::new(recording_observer(&events)));

  let mut handles = Vec::new();
  for t in 0..PRODUCERS {
    let serializer = serializer.clone();
    handles.push(thread::spawn(move || {
      for i in 0..PER_PRODUCER {
        serializer.next((t * PER_PRODUCER + i) as i32);
      }
    }));
  }
  let completer = {
    let serializer = serializer.clone();
    thread::spawn(move || serializer.complete())
  };
  for h in handles {
    h.join().unwrap();
  }
  completer.join().unwrap();

  let events = events.lock().unwrap();
  let completes =
    events.iter().filter(|e| **e == Event::Complete).count();
  assert_eq!(completes, 1, "exactly one terminal notification");
  assert_eq!(
    events.last(),
    Some(&Event::Complete),
    "the terminal is the last delivery"
  );
  assert!(events.len() <= PRODUCERS * PER_PRODUCER + 1);
}

// ==================== disposal races ====================

fn released_once_under_100_threads(make: impl Fn(BoxSubscription) -> BoxSubscription) {
  let hits = Arc::new(AtomicUsize::new(0));
  let h = hits.clone();
  let subscription: Arc<BoxSubscription> =
    Arc::new(make(Box::new(rxcore::subscription::FnSubscription::new(
      move || {
        h.fetch_add(1, Ordering::SeqCst);
      },
    ))));

  let mut handles = Vec::new();
  for _ in 0..100 {
    let subscription = subscription.clone();
    handles.push(thread::spawn(move || subscription.unsubscribe()));
  }
  for h in handles {
    h.join().unwrap();
  }
  assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn composite_disposal_race_releases_once() {
  released_once_under_100_threads(|inner| {
    let composite = CompositeSubscription::new();
    composite.add(inner);
    Box::new(composite)
  });
}

#[test]
fn serial_disposal_race_releases_once() {
  released_once_under_100_threads(|inner| {
    let serial = SerialSubscription::new();
    serial.set(inner);
    Box::new(serial)
  });
}

#[test]
fn ref_count_disposal_race_releases_once() {
  released_once_under_100_threads(|inner| {
    Box::new(RefCountSubscription::new(inner))
  });
}

// ==================== trampolined concatenation ====================

#[test]
fn concatenating_100_000_synchronous_sources_is_stack_safe() {
  let sources: Vec<_> =
    (0..100_000).map(|i| observable::of(i)).collect();
  let events = Arc::new(Mutex::new((Vec::new(), 0usize)));
  let (e1, e2) = (events.clone(), events.clone());
  concat(sources).subscribe_all(
    move |v| e1.lock().unwrap().0.push(v),
    |_| {},
    move || e2.lock().unwrap().1 += 1,
  );
  let events = events.lock().unwrap();
  assert_eq!(events.0.len(), 100_000);
  assert!(events.0.iter().enumerate().all(|(i, v)| i == *v));
  assert_eq!(events.1, 1, "exactly one completion after the last source");
}

// ==================== merge with concurrency cap ====================

#[test]
fn merge_cap_limits_simultaneous_subscriptions() {
  const SOURCES: usize = 10;
  const CAP: usize = 3;

  let active = Arc::new(AtomicUsize::new(0));
  let max_active = Arc::new(AtomicUsize::new(0));
  let mut feeds: Vec<PublishSubject<i32>> = Vec::new();
  let mut sources: Vec<Observable<i32>> = Vec::new();
  for _ in 0..SOURCES {
    let feed: PublishSubject<i32> = PublishSubject::new();
    let (active, max_active) = (active.clone(), max_active.clone());
    let inner_feed = feed.clone();
    sources.push(observable::create(move |publisher: Publisher<i32>| {
      let now = active.fetch_add(1, Ordering::SeqCst) + 1;
      max_active.fetch_max(now, Ordering::SeqCst);
      let active = active.clone();
      let done = publisher.clone();
      let complete_done = done.clone();
      let sub = inner_feed.observable().subscribe_all(
        move |v| publisher.next(v),
        |_| {},
        move || {
          active.fetch_sub(1, Ordering::SeqCst);
          complete_done.complete();
        },
      );
      done.set_teardown(sub);
    }));
    feeds.push(feed);
  }

  let got = Arc::new(Mutex::new(Vec::new()));
  let completed = Arc::new(AtomicUsize::new(0));
  let (g, c) = (got.clone(), completed.clone());
  observable::from_iter(sources).merge_all(CAP).subscribe_all(
    move |v| g.lock().unwrap().push(v),
    |_| {},
    move || {
      c.fetch_add(1, Ordering::SeqCst);
    },
  );

  assert_eq!(active.load(Ordering::SeqCst), CAP);
  for (i, feed) in feeds.iter_mut().enumerate() {
    feed.next(i as i32);
    feed.complete();
  }

  assert_eq!(max_active.load(Ordering::SeqCst), CAP);
  assert_eq!(completed.load(Ordering::SeqCst), 1);
  let mut got = got.lock().unwrap().clone();
  got.sort_unstable();
  assert_eq!(got, (0..SOURCES as i32).collect::<Vec<_>>());
}

// ==================== window shared teardown ====================

#[test]
fn upstream_survives_until_every_window_consumer_is_done() {
  let released = Arc::new(AtomicUsize::new(0));
  let feed: Arc<Mutex<Option<Publisher<i32>>>> = Arc::new(Mutex::new(None));
  let (r, f) = (released.clone(), feed.clone());
  let source = observable::create(move |publisher: Publisher<i32>| {
    let r = r.clone();
    publisher.set_teardown(rxcore::subscription::FnSubscription::boxed(
      move || {
        r.fetch_add(1, Ordering::SeqCst);
      },
    ));
    *f.lock().unwrap() = Some(publisher);
  });

  let windows = Arc::new(Mutex::new(Vec::new()));
  let w = windows.clone();
  let outer = source
    .window_count(10)
    .subscribe(move |window| w.lock().unwrap().push(window));

  feed.lock().unwrap().as_ref().unwrap().next(1);
  let window = windows.lock().unwrap()[0].clone();
  // two independent consumers of the still-open window
  let c1 = window.subscribe(|_| {});
  let c2 = window.subscribe(|_| {});

  outer.unsubscribe();
  assert_eq!(released.load(Ordering::SeqCst), 0, "window consumers still hold it");
  c1.unsubscribe();
  assert_eq!(released.load(Ordering::SeqCst), 0, "one consumer remains");
  c2.unsubscribe();
  assert_eq!(
    released.load(Ordering::SeqCst),
    1,
    "released once the last window consumer is done"
  );
}

// ==================== latest-wins switch, virtual time ====================

#[test]
fn switch_drops_late_values_of_superseded_inner() {
  TestScheduler::reset();
  let scheduler = TestScheduler;
  let mut outer: PublishSubject<Observable<&'static str>> =
    PublishSubject::new();
  let a: PublishSubject<&'static str> = PublishSubject::new();
  let b: PublishSubject<&'static str> = PublishSubject::new();

  let got = Arc::new(Mutex::new(Vec::new()));
  let g = got.clone();
  outer
    .observable()
    .switch_on_next()
    .subscribe(move |v| g.lock().unwrap().push(v));

  outer.next(a.observable());
  let mut outer_late = outer.clone();
  let b_obs = b.observable();
  scheduler.schedule(
    Some(Duration::from_millis(50)),
    Box::new(move || outer_late.next(b_obs)),
  );
  let mut b_late = b.clone();
  scheduler.schedule(
    Some(Duration::from_millis(60)),
    Box::new(move || b_late.next("b@60")),
  );
  let mut a_late = a.clone();
  scheduler.schedule(
    Some(Duration::from_millis(80)),
    Box::new(move || a_late.next("a@80")),
  );

  TestScheduler::advance_by(Duration::from_millis(100));
  // A was superseded at 50ms; its 80ms value no longer matches the latest id
  assert_eq!(*got.lock().unwrap(), vec!["b@60"]);
}

// ==================== end-to-end pipeline ====================

#[test]
fn filter_then_scan_end_to_end() {
  let events = Arc::new(Mutex::new(Vec::new()));
  let observer_events = events.clone();
  observable::from_iter(1..=5)
    .filter(|v| v % 2 == 0)
    .scan(0, |acc, v| acc + v)
    .subscribe_all(
      {
        let e = observer_events.clone();
        move |v| e.lock().unwrap().push(Event::Next(v))
      },
      {
        let e = observer_events.clone();
        move |err: RxError| {
          e.lock().unwrap().push(Event::Error(err.to_string()))
        }
      },
      move || observer_events.lock().unwrap().push(Event::Complete),
    );
  assert_eq!(
    *events.lock().unwrap(),
    vec![Event::Next(2), Event::Next(6), Event::Complete]
  );
}

// ==================== late-call absorption through a chain ====================

#[test]
fn nothing_reaches_downstream_after_a_terminal() {
  let events = Arc::new(Mutex::new(Vec::new()));
  let e = events.clone();
  let source = observable::create(move |publisher: Publisher<i32>| {
    publisher.next(1);
    publisher.complete();
    // a misbehaving source keeps calling; everything must be absorbed
    publisher.next(2);
    publisher.error(RxError::msg("late error"));
    publisher.complete();
  });
  source.map(|v| v * 10).subscribe_all(
    {
      let e = e.clone();
      move |v| e.lock().unwrap().push(Event::Next(v))
    },
    {
      let e = e.clone();
      move |err: RxError| e.lock().unwrap().push(Event::Error(err.to_string()))
    },
    move || e.lock().unwrap().push(Event::Complete),
  );
  assert_eq!(
    *events.lock().unwrap(),
    vec![Event::Next(10), Event::Complete]
  );
}
