//! Multicast broadcast hub with observer/observable duality.
//!
//! A [`PublishSubject`] is an observer (values can be pushed into it) and an
//! observable (any number of observers can subscribe to its broadcasts).
//! The engine uses it for window contents and for the retry/repeat signal
//! channel; it is also the building block for hand-rolled multicasting.
//!
//! Calls into the observer side must be serialized by the caller (the
//! engine's internal uses all are — gates, async lock, trampoline);
//! `unsubscribe` of individual subscriptions may race freely, including
//! reentrantly from inside a broadcast.

use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

use crate::{
  error::RxError,
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  subscription::{BoxSubscription, Subscription},
};

enum Terminal {
  Error(RxError),
  Complete,
}

struct Entry<Item> {
  id: u64,
  observer: BoxedObserver<Item>,
}

struct SubjectState<Item> {
  subscribers: Vec<Entry<Item>>,
  // bookkeeping for mutations arriving while the list is out on loan to a
  // broadcast in progress
  dispatching: bool,
  added: Vec<Entry<Item>>,
  removed: SmallVec<[u64; 2]>,
  next_id: u64,
  terminal: Option<Terminal>,
}

impl<Item> Default for SubjectState<Item> {
  fn default() -> Self {
    SubjectState {
      subscribers: Vec::new(),
      dispatching: false,
      added: Vec::new(),
      removed: SmallVec::new(),
      next_id: 0,
      terminal: None,
    }
  }
}

/// Thread-safe multicast subject. Cloning shares the hub.
pub struct PublishSubject<Item> {
  state: Arc<Mutex<SubjectState<Item>>>,
}

impl<Item> Clone for PublishSubject<Item> {
  fn clone(&self) -> Self { PublishSubject { state: self.state.clone() } }
}

impl<Item> Default for PublishSubject<Item> {
  fn default() -> Self {
    PublishSubject { state: Arc::new(Mutex::new(SubjectState::default())) }
  }
}

impl<Item: Send + 'static> PublishSubject<Item> {
  pub fn new() -> Self { Self::default() }

  /// This subject viewed as an observable.
  pub fn observable(&self) -> Observable<Item> {
    Observable::new(SubjectSource { state: self.state.clone() })
  }

  /// Takes the subscriber list out for a broadcast; the lock is not held
  /// while observers run, so a subscriber may unsubscribe (or subscribe)
  /// reentrantly.
  fn borrow_list(&self) -> Option<Vec<Entry<Item>>> {
    let mut state = self.state.lock().unwrap();
    if state.terminal.is_some() {
      return None;
    }
    state.dispatching = true;
    Some(std::mem::take(&mut state.subscribers))
  }

  fn restore_list(&self, mut list: Vec<Entry<Item>>) {
    let terminal_late = {
      let mut state = self.state.lock().unwrap();
      state.dispatching = false;
      list.retain(|e| !state.removed.contains(&e.id));
      state.removed.clear();
      let added = std::mem::take(&mut state.added);
      list.extend(added);
      if state.terminal.is_none() {
        state.subscribers = list;
        None
      } else {
        // a terminal latched while the list was on loan; these observers
        // still owe their terminal notification
        Some(list)
      }
    };
    if let Some(list) = terminal_late {
      self.finish(list);
    }
  }

  fn finish(&self, list: Vec<Entry<Item>>) {
    let state = self.state.lock().unwrap();
    let err = match &state.terminal {
      Some(Terminal::Error(err)) => Some(err.clone()),
      Some(Terminal::Complete) => None,
      None => unreachable!("finish without a latched terminal"),
    };
    drop(state);
    for mut entry in list {
      match &err {
        Some(err) => entry.observer.error(err.clone()),
        None => entry.observer.complete(),
      }
    }
  }

  /// True once a terminal has been latched.
  pub fn is_terminated(&self) -> bool {
    self.state.lock().unwrap().terminal.is_some()
  }
}

impl<Item: Clone + Send + 'static> Observer<Item> for PublishSubject<Item> {
  fn next(&mut self, value: Item) {
    let Some(mut list) = self.borrow_list() else { return };
    for entry in &mut list {
      entry.observer.next(value.clone());
    }
    self.restore_list(list);
  }

  fn error(&mut self, err: RxError) {
    let list = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(Terminal::Error(err));
      std::mem::take(&mut state.subscribers)
    };
    self.finish(list);
  }

  fn complete(&mut self) {
    let list = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(Terminal::Complete);
      std::mem::take(&mut state.subscribers)
    };
    self.finish(list);
  }

  fn is_closed(&self) -> bool { self.is_terminated() }
}

struct SubjectSource<Item> {
  state: Arc<Mutex<SubjectState<Item>>>,
}

impl<Item: Send + 'static> CoreObservable<Item> for SubjectSource<Item> {
  fn actual_subscribe(
    &self,
    mut observer: BoxedObserver<Item>,
  ) -> BoxSubscription {
    let replay = {
      let mut state = self.state.lock().unwrap();
      match &state.terminal {
        // a late subscriber gets the latched terminal immediately
        Some(Terminal::Error(err)) => Some(Some(err.clone())),
        Some(Terminal::Complete) => Some(None),
        None => {
          let id = state.next_id;
          state.next_id += 1;
          let entry = Entry { id, observer };
          if state.dispatching {
            state.added.push(entry);
          } else {
            state.subscribers.push(entry);
          }
          return Box::new(SubjectSubscription {
            id,
            state: self.state.clone(),
          });
        }
      }
    };
    match replay {
      Some(Some(err)) => observer.error(err),
      Some(None) => observer.complete(),
      None => unreachable!(),
    }
    crate::subscription::nop()
  }
}

struct SubjectSubscription<Item> {
  id: u64,
  state: Arc<Mutex<SubjectState<Item>>>,
}

impl<Item> Subscription for SubjectSubscription<Item> {
  fn unsubscribe(&self) {
    let _dropped = {
      let mut state = self.state.lock().unwrap();
      if state.dispatching {
        // the list is on loan; record the removal for the restore pass
        if !state.removed.contains(&self.id) {
          state.removed.push(self.id);
        }
        None
      } else {
        state
          .subscribers
          .iter()
          .position(|e| e.id == self.id)
          .map(|idx| state.subscribers.swap_remove(idx))
      }
    };
    // observer dropped outside the lock
  }

  fn is_closed(&self) -> bool {
    let state = self.state.lock().unwrap();
    state.terminal.is_some()
      || (!state.subscribers.iter().any(|e| e.id == self.id)
        && !state.added.iter().any(|e| e.id == self.id))
  }
}
