//! Single-assignment subscription with race-safe "unsubscribe wins"
//! semantics.

use std::sync::{
  atomic::{AtomicU8, Ordering},
  Arc, Mutex,
};

use crate::subscription::{BoxSubscription, Subscription};

const EMPTY: u8 = 0;
const SET: u8 = 1;
const CLOSED: u8 = 2;

/// Accepts exactly one concrete resource. If released before assignment, a
/// later-assigned resource is released immediately instead of stored.
///
/// Operators use this for their upstream handle: disposal can race with
/// subscription setup, and whichever side loses the compare-and-swap defers
/// to the winner.
#[derive(Clone, Default)]
pub struct SingleSubscription {
  inner: Arc<Single>,
}

#[derive(Default)]
struct Single {
  state: AtomicU8,
  slot: Mutex<Option<BoxSubscription>>,
}

impl SingleSubscription {
  pub fn new() -> Self { Self::default() }

  /// Assigns the resource. At most one assignment may ever be made; if the
  /// subscription was already closed, the resource is released immediately.
  ///
  /// A second assignment is a protocol misuse: the new resource is released
  /// and the first is kept (debug builds assert).
  pub fn set(&self, sub: BoxSubscription) {
    // The slot lock is held across the CAS so a racing `unsubscribe` cannot
    // take the slot between our state transition and the store.
    let rejected = {
      let mut slot = self.inner.slot.lock().unwrap();
      match self.inner.state.compare_exchange(
        EMPTY,
        SET,
        Ordering::AcqRel,
        Ordering::Acquire,
      ) {
        Ok(_) => {
          *slot = Some(sub);
          None
        }
        Err(state) => {
          debug_assert!(state == CLOSED, "SingleSubscription assigned twice");
          Some(sub)
        }
      }
    };
    if let Some(sub) = rejected {
      sub.unsubscribe();
    }
  }
}

impl Subscription for SingleSubscription {
  fn unsubscribe(&self) {
    if self.inner.state.swap(CLOSED, Ordering::AcqRel) == CLOSED {
      return;
    }
    let taken = self.inner.slot.lock().unwrap().take();
    // Release outside the lock: the resource's teardown may reenter.
    if let Some(sub) = taken {
      sub.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool {
    self.inner.state.load(Ordering::Acquire) == CLOSED
  }
}
