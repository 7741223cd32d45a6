//! The error value carried on the `error` channel.
//!
//! Terminal errors have to be stored in shared slots (half-serializer) and
//! cloned into several consumers (retry signals, window subjects), so the
//! engine uses one concrete, cheaply cloneable error type instead of a
//! generic `Err` parameter.

use std::{
  any::Any,
  error::Error,
  fmt::{self, Debug, Display, Formatter},
  sync::Arc,
};

/// A shared, cloneable error flowing through a pipeline's `error` channel.
///
/// Wraps any `Error + Send + Sync`. Cloning is an `Arc` bump; equality of
/// clones can be checked with [`RxError::ptr_eq`].
#[derive(Clone)]
pub struct RxError(Arc<dyn Error + Send + Sync>);

impl RxError {
  /// Wraps a concrete error value.
  pub fn new<E: Error + Send + Sync + 'static>(err: E) -> Self {
    RxError(Arc::new(err))
  }

  /// Creates an error from a plain message.
  pub fn msg(msg: impl Into<String>) -> Self {
    RxError(Arc::new(MessageError(msg.into())))
  }

  /// Converts a captured panic payload into an error.
  ///
  /// Used by the callback fault guard: a panicking user callback becomes a
  /// downstream `error` instead of unwinding into the producer's stack.
  pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "callback panicked".to_owned()
    };
    RxError(Arc::new(CallbackPanicked(msg)))
  }

  /// True if both handles refer to the same underlying error.
  pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }

  /// Borrows the wrapped error.
  pub fn as_inner(&self) -> &(dyn Error + Send + Sync) { &*self.0 }

  /// Attempts to downcast the wrapped error to a concrete type.
  pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
    self.0.downcast_ref::<E>()
  }
}

impl Display for RxError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { Display::fmt(&self.0, f) }
}

impl Debug for RxError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { Debug::fmt(&self.0, f) }
}

impl<E: Error + Send + Sync + 'static> From<E> for RxError {
  fn from(err: E) -> Self { RxError::new(err) }
}

/// Error produced by [`RxError::msg`].
#[derive(Debug)]
pub struct MessageError(String);

impl Display for MessageError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl Error for MessageError {}

/// Error produced when a user callback panicked during notification handling.
#[derive(Debug)]
pub struct CallbackPanicked(String);

impl Display for CallbackPanicked {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "callback panicked: {}", self.0)
  }
}

impl Error for CallbackPanicked {}

/// Error produced by checked aggregates when accumulation overflows.
#[derive(Debug, PartialEq, Eq)]
pub struct OverflowError;

impl Display for OverflowError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str("arithmetic overflow during accumulation")
  }
}

impl Error for OverflowError {}

pub(crate) mod fault {
  use std::panic::{catch_unwind, AssertUnwindSafe};

  use super::RxError;

  /// Runs a user-supplied callback, converting a panic into an `RxError`.
  ///
  /// Every selector/predicate/accumulator/factory invocation in the engine
  /// goes through here, so faults surface as a downstream `error` at the
  /// operator that raised them.
  pub(crate) fn guard<T>(f: impl FnOnce() -> T) -> Result<T, RxError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(RxError::from_panic)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clones_share_the_value() {
    let e = RxError::msg("boom");
    let c = e.clone();
    assert!(e.ptr_eq(&c));
    assert_eq!(e.to_string(), "boom");
  }

  #[test]
  fn downcast_overflow() {
    let e = RxError::new(OverflowError);
    assert!(e.downcast_ref::<OverflowError>().is_some());
    assert!(e.downcast_ref::<MessageError>().is_none());
  }

  #[test]
  fn guard_converts_panic() {
    let r: Result<(), _> = fault::guard(|| panic!("selector failed"));
    let err = r.unwrap_err();
    assert!(err.to_string().contains("selector failed"));
  }

  #[test]
  fn guard_passes_value_through() {
    assert_eq!(fault::guard(|| 7).unwrap(), 7);
  }
}
