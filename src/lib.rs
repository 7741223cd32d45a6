//! # rxcore: the Reactive Extensions operator execution core
//!
//! A push-based reactive-stream engine: sources emit a possibly infinite
//! sequence of values to a subscribed observer, terminated by exactly one of
//! completion or error. Operators compose into pipelines with well-defined
//! propagation, cancellation, and thread-safety semantics.
//!
//! The crate centers on the coordination machinery every operator is built
//! from, not on any single operator's transformation logic:
//!
//! | Piece | Guarantee |
//! |-------|-----------|
//! | [`subscription`] | idempotent, reentrancy-safe, composable cancellation |
//! | [`sink`] | one terminal per execution, late-call absorption, upstream release |
//! | [`serializer`] | lock-free one-at-a-time delivery under racing producers |
//! | [`async_lock`] | mutual exclusion that queues instead of blocking |
//! | [`trampoline`] | constant-stack sequential subscription |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxcore::prelude::*;
//!
//! let got = Arc::new(Mutex::new(Vec::new()));
//! let sink = got.clone();
//! observable::from_iter(1..=5)
//!   .filter(|v| v % 2 == 0)
//!   .scan(0, |acc, v| acc + v)
//!   .subscribe(move |v| sink.lock().unwrap().push(v));
//! assert_eq!(*got.lock().unwrap(), vec![2, 6]);
//! ```
//!
//! Producers may emit from any thread; a pipeline's downstream observer
//! still sees an ordered sequence with exactly one terminal. Unsubscribing
//! the returned handle transitively releases every upstream subscription and
//! pending timer, and never deadlocks against in-flight delivery.

pub mod async_lock;
pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub mod serializer;
pub mod sink;
pub mod subject;
pub mod subscription;
pub mod trampoline;

pub use prelude::*;
