//! Sources backed by iterators and single values.

use crate::{
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  sink::Sink,
  subscription::BoxSubscription,
};

struct FromIter<I> {
  iter: I,
}

impl<I> CoreObservable<I::Item> for FromIter<I>
where
  I: IntoIterator + Clone + Send + Sync,
  I::Item: Send + 'static,
{
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<I::Item>,
  ) -> BoxSubscription {
    let sink = Sink::new(observer);
    for value in self.iter.clone() {
      // a downstream `take` (or an unsubscribe) stops the loop early
      if sink.is_stopped() {
        break;
      }
      sink.forward_next(value);
    }
    sink.forward_complete();
    sink.handle()
  }
}

/// Emits every value of the (cloneable) iterable, then completes. Each
/// subscription iterates a fresh clone.
///
/// ```
/// use rxcore::prelude::*;
///
/// observable::from_iter(0..3).subscribe(|v| println!("{v}"));
/// ```
pub fn from_iter<I>(iter: I) -> Observable<I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: Send + 'static,
{
  Observable::new(FromIter { iter })
}

/// Emits one value, then completes.
pub fn of<Item: Clone + Send + Sync + 'static>(value: Item) -> Observable<Item> {
  from_iter(std::iter::once(value))
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[test]
  fn emits_all_then_completes() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (e1, e2) = (events.clone(), events.clone());
    from_iter(1..=3).subscribe_all(
      move |v| e1.lock().unwrap().push(format!("next({v})")),
      |_| {},
      move || e2.lock().unwrap().push("complete".to_owned()),
    );
    assert_eq!(
      *events.lock().unwrap(),
      vec!["next(1)", "next(2)", "next(3)", "complete"]
    );
  }

  #[test]
  fn of_emits_single_value() {
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = got.clone();
    of("hello").subscribe(move |v| g.lock().unwrap().push(v));
    assert_eq!(*got.lock().unwrap(), vec!["hello"]);
  }

  #[test]
  fn supports_multiple_subscriptions() {
    let source = from_iter(vec![1, 2, 3]);
    for _ in 0..2 {
      let sum = Arc::new(Mutex::new(0));
      let s = sum.clone();
      source.subscribe(move |v| *s.lock().unwrap() += v);
      assert_eq!(*sum.lock().unwrap(), 6);
    }
  }
}
