//! Static concatenation of a known sequence of sources.
//!
//! Subscribes to the sources one at a time, advancing on each completion
//! through the trampoline so arbitrarily long chains of synchronously
//! completing sources run in constant stack space. A concat source nested
//! inside another concat is flattened into the same drive loop via the
//! `concat_sources` extraction hook.

use crate::{
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  sink::Sink,
  subscription::{BoxSubscription, SerialSubscription},
  trampoline::TrampolineSink,
};

struct ConcatOp<Item> {
  sources: Vec<Observable<Item>>,
}

impl<Item: Send + 'static> CoreObservable<Item> for ConcatOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let serial = SerialSubscription::new();
    sink.set_upstream(Box::new(serial.clone()));
    TrampolineSink::new(sink.clone(), self.sources.clone(), serial).drive();
    sink.handle()
  }

  fn concat_sources(&self) -> Option<Vec<Observable<Item>>> {
    Some(self.sources.clone())
  }
}

/// Emits the values of each source in turn, completing once the last one
/// completes.
pub fn concat<Item: Send + 'static>(
  sources: impl IntoIterator<Item = Observable<Item>>,
) -> Observable<Item> {
  Observable::new(ConcatOp { sources: sources.into_iter().collect() })
}
