use crate::{
  observable::{CoreObservable, Observable},
  observer::BoxedObserver,
  scheduler::SharedScheduler,
  sink::{IdentityObserver, Sink},
  subscription::{BoxSubscription, CompositeSubscription, SingleSubscription},
};

struct SubscribeOnOp<Item> {
  source: Observable<Item>,
  scheduler: SharedScheduler,
}

impl<Item: Send + 'static> CoreObservable<Item> for SubscribeOnOp<Item> {
  fn actual_subscribe(&self, observer: BoxedObserver<Item>) -> BoxSubscription {
    let sink = Sink::new(observer);
    let upstream = SingleSubscription::new();
    let teardown = CompositeSubscription::new();
    teardown.add(Box::new(upstream.clone()));

    let source = self.source.clone();
    let delivery = sink.clone();
    let pending = upstream.clone();
    let schedule_handle = self.scheduler.schedule(
      None,
      Box::new(move || {
        let up = source.actual_subscribe(Box::new(IdentityObserver(delivery)));
        // disposal racing the scheduled subscribe resolves through the
        // single-assignment handle
        pending.set(up);
      }),
    );
    teardown.add(schedule_handle);
    sink.set_upstream(Box::new(teardown));
    sink.handle()
  }
}

pub(crate) fn subscribe_on<Item: Send + 'static>(
  source: Observable<Item>,
  scheduler: SharedScheduler,
) -> Observable<Item> {
  Observable::new(SubscribeOnOp { source, scheduler })
}
