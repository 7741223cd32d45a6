//! Queue-based mutual exclusion that never blocks a thread.
//!
//! Competing "enter critical section" requests queue their action; exactly
//! one runs at a time, and whichever thread vacates the lock drains the
//! actions queued behind it. Used where the critical section itself performs
//! a scheduled/subscribing action (e.g. rotating a window boundary) and must
//! not run concurrently with itself.

use std::{collections::VecDeque, sync::Mutex};

use crate::subscription::Subscription;

type Action = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct LockState {
  queue: VecDeque<Action>,
  is_acquired: bool,
  has_faulted: bool,
}

/// Non-blocking, FIFO-fair mutual exclusion for one-shot actions.
///
/// The internal mutex guards only queue manipulation, never a running
/// action, so `wait` is reentrancy-safe: an action may call `wait` on the
/// same lock and its follow-up is simply queued behind it.
#[derive(Default)]
pub struct AsyncLock {
  state: Mutex<LockState>,
}

impl AsyncLock {
  pub fn new() -> Self { Self::default() }

  /// Queues `action`; if no owner is active, the calling thread becomes the
  /// owner and drains the queue (its own action first) before returning.
  pub fn wait(&self, action: impl FnOnce() + Send + 'static) {
    let is_owner = {
      let mut state = self.state.lock().unwrap();
      if state.has_faulted {
        return;
      }
      state.queue.push_back(Box::new(action));
      if state.is_acquired {
        false
      } else {
        state.is_acquired = true;
        true
      }
    };
    if !is_owner {
      return;
    }
    loop {
      let work = {
        let mut state = self.state.lock().unwrap();
        match state.queue.pop_front() {
          Some(work) => work,
          None => {
            state.is_acquired = false;
            return;
          }
        }
      };
      // if the action panics, poison the lock so no queued work runs on a
      // broken invariant, then let the panic continue
      let guard = FaultGuard(self);
      work();
      std::mem::forget(guard);
    }
  }
}

struct FaultGuard<'a>(&'a AsyncLock);

impl Drop for FaultGuard<'_> {
  fn drop(&mut self) {
    if let Ok(mut state) = self.0.state.lock() {
      state.has_faulted = true;
      state.queue.clear();
    }
  }
}

impl Subscription for AsyncLock {
  /// Faults the lock: pending actions are dropped and future `wait` calls
  /// become no-ops.
  fn unsubscribe(&self) {
    let mut state = self.state.lock().unwrap();
    state.has_faulted = true;
    state.queue.clear();
  }

  fn is_closed(&self) -> bool { self.state.lock().unwrap().has_faulted }
}
