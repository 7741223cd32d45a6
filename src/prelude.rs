//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Core traits
pub use crate::observable::{CoreObservable, Observable};
pub use crate::observer::{BoxedObserver, Observer};
// Creation/Factories
pub use crate::observable::{
  create, defer, empty, from_iter, interval, never, of, throw, timer,
  Publisher,
};
// Re-export the module itself for `observable::from_iter(..)` call style
pub use crate::observable;
// Error value
pub use crate::error::RxError;
// Coordination primitives
pub use crate::async_lock::AsyncLock;
pub use crate::serializer::HalfSerializer;
pub use crate::sink::Sink;
pub use crate::trampoline::TrampolineSink;
// Scheduler
pub use crate::scheduler::{
  new_thread, thread_pool, Duration, Instant, Scheduler, SharedScheduler,
  TestScheduler,
};
// Subject
pub use crate::subject::PublishSubject;
// Subscription
pub use crate::subscription::{
  BoxSubscription, CompositeSubscription, RefCountSubscription,
  SerialSubscription, SingleSubscription, Subscription, SubscriptionGuard,
};
// Static concatenation
pub use crate::ops::concat::concat;
