//! Serial subscription: holds the "current" resource, releasing the
//! previous one on every replacement.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use crate::subscription::{BoxSubscription, Subscription};

/// Holds at most one live resource at a time. Assigning a new one releases
/// the previous; closing releases the current and rejects all future
/// assignments (they are released immediately).
///
/// This is the handle behind "replace the in-flight inner subscription"
/// operators: switch, retry resubscription, timer rotation.
#[derive(Clone, Default)]
pub struct SerialSubscription {
  inner: Arc<Serial>,
}

#[derive(Default)]
struct Serial {
  closed: AtomicBool,
  current: Mutex<Option<BoxSubscription>>,
}

impl SerialSubscription {
  pub fn new() -> Self { Self::default() }

  /// Installs `sub` as the current resource, releasing whichever resource
  /// was current before. If the serial is already closed, `sub` is released
  /// immediately.
  pub fn set(&self, sub: BoxSubscription) {
    let displaced = {
      let mut current = self.inner.current.lock().unwrap();
      if self.inner.closed.load(Ordering::Acquire) {
        Some(sub)
      } else {
        current.replace(sub)
      }
    };
    if let Some(old) = displaced {
      old.unsubscribe();
    }
  }
}

impl Subscription for SerialSubscription {
  fn unsubscribe(&self) {
    let taken = {
      let mut current = self.inner.current.lock().unwrap();
      if self.inner.closed.swap(true, Ordering::AcqRel) {
        None
      } else {
        current.take()
      }
    };
    if let Some(sub) = taken {
      sub.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.inner.closed.load(Ordering::Acquire) }
}
