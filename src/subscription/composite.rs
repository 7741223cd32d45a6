//! Composite subscription: an atomically-mutable collection of children.

use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

use crate::subscription::{BoxSubscription, Subscription};

/// Key returned by [`CompositeSubscription::add`], making removal O(1)
/// amortized (slot index, not a list scan). High-fan-in operators — merge
/// with many concurrent inner subscriptions — rely on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeKey(usize);

/// A collection of child subscriptions released together.
///
/// Closing releases all children and flips the composite into a terminal
/// state in which newly added children are released immediately instead of
/// stored.
#[derive(Clone, Default)]
pub struct CompositeSubscription {
  inner: Arc<Mutex<Composite>>,
}

#[derive(Default)]
struct Composite {
  closed: bool,
  slots: SmallVec<[Option<BoxSubscription>; 2]>,
  free: SmallVec<[usize; 2]>,
  active: usize,
}

impl CompositeSubscription {
  pub fn new() -> Self { Self::default() }

  /// Adds a child, returning its removal key. A child added after the
  /// composite closed is released immediately and the returned key is inert.
  pub fn add(&self, sub: BoxSubscription) -> CompositeKey {
    let (rejected, key) = {
      let mut inner = self.inner.lock().unwrap();
      if inner.closed {
        (Some(sub), CompositeKey(usize::MAX))
      } else {
        let idx = match inner.free.pop() {
          Some(idx) => {
            inner.slots[idx] = Some(sub);
            idx
          }
          None => {
            inner.slots.push(Some(sub));
            inner.slots.len() - 1
          }
        };
        inner.active += 1;
        (None, CompositeKey(idx))
      }
    };
    if let Some(sub) = rejected {
      sub.unsubscribe();
    }
    key
  }

  /// Removes and releases the child behind `key`. Removing twice, or
  /// removing after close, is a no-op.
  pub fn remove(&self, key: CompositeKey) {
    let taken = {
      let mut inner = self.inner.lock().unwrap();
      match inner.slots.get_mut(key.0).and_then(Option::take) {
        Some(sub) => {
          inner.free.push(key.0);
          inner.active -= 1;
          Some(sub)
        }
        None => None,
      }
    };
    if let Some(sub) = taken {
      sub.unsubscribe();
    }
  }

  /// Number of children currently held.
  pub fn len(&self) -> usize { self.inner.lock().unwrap().active }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Subscription for CompositeSubscription {
  fn unsubscribe(&self) {
    let children: SmallVec<[BoxSubscription; 2]> = {
      let mut inner = self.inner.lock().unwrap();
      if inner.closed {
        return;
      }
      inner.closed = true;
      inner.active = 0;
      inner.free.clear();
      inner.slots.drain(..).flatten().collect()
    };
    // Children release outside the lock: a child's teardown may add to or
    // close this very composite.
    for child in children {
      child.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.inner.lock().unwrap().closed }
}
