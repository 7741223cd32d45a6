//! Checked accumulation operators: count, sum, average.
//!
//! Accumulation is checked; overflow is forwarded as `error` instead of
//! wrapping.

use crate::{
  error::{OverflowError, RxError},
  observable::{CoreObservable, Observable},
  observer::{BoxedObserver, Observer},
  sink::Sink,
  subscription::BoxSubscription,
};

/// Checked addition for accumulator types, with an additive identity.
pub trait CheckedAdd: Sized + Copy + Send + Sync + 'static {
  const ZERO: Self;

  fn checked_add(self, other: Self) -> Option<Self>;
}

macro_rules! impl_checked_add {
  ($($ty:ty),*) => {
    $(
      impl CheckedAdd for $ty {
        const ZERO: Self = 0;

        #[inline]
        fn checked_add(self, other: Self) -> Option<Self> {
          <$ty>::checked_add(self, other)
        }
      }
    )*
  };
}

impl_checked_add!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize);

// ==================== count ====================

struct CountOp<Item> {
  source: Observable<Item>,
}

impl<Item: Send + 'static> CoreObservable<usize> for CountOp<Item> {
  fn actual_subscribe(
    &self,
    observer: BoxedObserver<usize>,
  ) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(CountObserver {
      sink: sink.clone(),
      count: 0,
      _marker: std::marker::PhantomData,
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct CountObserver<Item> {
  sink: Sink<usize>,
  count: usize,
  _marker: std::marker::PhantomData<fn(Item)>,
}

impl<Item> Observer<Item> for CountObserver<Item> {
  fn next(&mut self, _value: Item) {
    match self.count.checked_add(1) {
      Some(count) => self.count = count,
      None => self.sink.forward_error(RxError::new(OverflowError)),
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) {
    self.sink.forward_next(self.count);
    self.sink.forward_complete();
  }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn count<Item: Send + 'static>(
  source: Observable<Item>,
) -> Observable<usize> {
  Observable::new(CountOp { source })
}

// ==================== sum ====================

struct SumOp<Item> {
  source: Observable<Item>,
}

impl<Item: CheckedAdd> CoreObservable<Item> for SumOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(SumObserver {
      sink: sink.clone(),
      acc: Item::ZERO,
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct SumObserver<Item> {
  sink: Sink<Item>,
  acc: Item,
}

impl<Item: CheckedAdd> Observer<Item> for SumObserver<Item> {
  fn next(&mut self, value: Item) {
    match self.acc.checked_add(value) {
      Some(acc) => self.acc = acc,
      None => self.sink.forward_error(RxError::new(OverflowError)),
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) {
    self.sink.forward_next(self.acc);
    self.sink.forward_complete();
  }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn sum<Item: CheckedAdd>(
  source: Observable<Item>,
) -> Observable<Item> {
  Observable::new(SumOp { source })
}

// ==================== average ====================

struct AverageOp<Item> {
  source: Observable<Item>,
}

impl<Item> CoreObservable<f64> for AverageOp<Item>
where
  Item: Into<f64> + Send + 'static,
{
  fn actual_subscribe(&self, observer: BoxedObserver<f64>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let up = self.source.actual_subscribe(Box::new(AverageObserver {
      sink: sink.clone(),
      sum: 0.0,
      count: 0usize,
      _marker: std::marker::PhantomData,
    }));
    sink.set_upstream(up);
    sink.handle()
  }
}

struct AverageObserver<Item> {
  sink: Sink<f64>,
  sum: f64,
  count: usize,
  _marker: std::marker::PhantomData<fn(Item)>,
}

impl<Item: Into<f64>> Observer<Item> for AverageObserver<Item> {
  fn next(&mut self, value: Item) {
    self.sum += value.into();
    match self.count.checked_add(1) {
      Some(count) => self.count = count,
      None => self.sink.forward_error(RxError::new(OverflowError)),
    }
  }

  fn error(&mut self, err: RxError) { self.sink.forward_error(err) }

  fn complete(&mut self) {
    // an empty source has no mean; it just completes
    if self.count > 0 {
      self.sink.forward_next(self.sum / self.count as f64);
    }
    self.sink.forward_complete();
  }

  fn is_closed(&self) -> bool { self.sink.is_stopped() }
}

pub(crate) fn average<Item>(source: Observable<Item>) -> Observable<f64>
where
  Item: Into<f64> + Send + 'static,
{
  Observable::new(AverageOp { source })
}
