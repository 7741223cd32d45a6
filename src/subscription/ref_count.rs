//! Ref-counted subscription: shared teardown across dependent handles.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use crate::subscription::{BoxSubscription, Subscription};

/// Wraps one primary subscription and issues lightweight dependent handles.
///
/// The primary resource is released only once the primary's own release has
/// been requested *and* every dependent handle has been released. Windowing
/// uses this to model "don't tear down the shared upstream until the last
/// open window is done with it".
#[derive(Clone)]
pub struct RefCountSubscription {
  state: Arc<Mutex<RefCount>>,
}

struct RefCount {
  dependents: usize,
  primary_closed: bool,
  underlying: Option<BoxSubscription>,
}

impl RefCountSubscription {
  pub fn new(underlying: BoxSubscription) -> Self {
    RefCountSubscription {
      state: Arc::new(Mutex::new(RefCount {
        dependents: 0,
        primary_closed: false,
        underlying: Some(underlying),
      })),
    }
  }

  /// Issues a dependent handle. If the underlying resource was already
  /// released, the handle comes back already closed.
  pub fn acquire(&self) -> RefCountHandle {
    let mut state = self.state.lock().unwrap();
    if state.underlying.is_none() {
      RefCountHandle {
        state: self.state.clone(),
        released: AtomicBool::new(true),
      }
    } else {
      state.dependents += 1;
      RefCountHandle {
        state: self.state.clone(),
        released: AtomicBool::new(false),
      }
    }
  }
}

fn release_if_done(state: &Mutex<RefCount>) {
  let taken = {
    let mut s = state.lock().unwrap();
    if s.primary_closed && s.dependents == 0 {
      s.underlying.take()
    } else {
      None
    }
  };
  if let Some(sub) = taken {
    sub.unsubscribe();
  }
}

impl Subscription for RefCountSubscription {
  fn unsubscribe(&self) {
    self.state.lock().unwrap().primary_closed = true;
    release_if_done(&self.state);
  }

  fn is_closed(&self) -> bool { self.state.lock().unwrap().primary_closed }
}

/// Dependent handle issued by [`RefCountSubscription::acquire`].
pub struct RefCountHandle {
  state: Arc<Mutex<RefCount>>,
  released: AtomicBool,
}

impl Subscription for RefCountHandle {
  fn unsubscribe(&self) {
    if self.released.swap(true, Ordering::AcqRel) {
      return;
    }
    self.state.lock().unwrap().dependents -= 1;
    release_if_done(&self.state);
  }

  fn is_closed(&self) -> bool { self.released.load(Ordering::Acquire) }
}
