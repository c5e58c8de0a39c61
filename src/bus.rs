//! # Event Bus
//! In-process publish/subscribe for normalized events.
//!
//! Delivery is synchronous and in publish order: `publish` returns only after
//! every subscriber has seen the event. A subscriber that returns `Err` or
//! panics is logged and counted; the remaining subscribers still receive the
//! event. Subscribers are identified by the [`SubscriptionId`] returned from
//! [`EventBus::subscribe`] and removed explicitly with [`EventBus::unsubscribe`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;

use crate::ingest::types::NormalizedEvent;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Arc<NormalizedEvent>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    name: Arc<str>,
    handler: Handler,
}

/// Outcome of delivering one (or a batch of) event(s).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

impl PublishReport {
    fn absorb(&mut self, other: PublishReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; `name` only shows up in logs.
    pub fn subscribe<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Arc<NormalizedEvent>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber {
            id,
            name: Arc::from(name),
            handler: Arc::new(handler),
        });
        tracing::debug!(target: "bus", subscriber = name, "subscribed");
        id
    }

    /// Returns `false` if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        before != subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to every current subscriber, in subscription order.
    pub fn publish(&self, event: Arc<NormalizedEvent>) -> PublishReport {
        // Deliver from a snapshot so handlers may (un)subscribe re-entrantly.
        let snapshot: Vec<Subscriber> = self.subscribers.read().clone();
        let mut report = PublishReport::default();

        for sub in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| (sub.handler)(&event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        target: "bus",
                        subscriber = %sub.name,
                        event_id = %event.id,
                        error = %e,
                        "subscriber failed"
                    );
                    counter!("bus_handler_errors_total").increment(1);
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        target: "bus",
                        subscriber = %sub.name,
                        event_id = %event.id,
                        panic = panic_message(&panic),
                        "subscriber panicked"
                    );
                    counter!("bus_handler_errors_total").increment(1);
                }
            }
        }

        counter!("bus_published_total").increment(1);
        report
    }

    /// Publish each event in order; reports are summed.
    pub fn publish_all<I>(&self, events: I) -> PublishReport
    where
        I: IntoIterator<Item = Arc<NormalizedEvent>>,
    {
        let mut total = PublishReport::default();
        for ev in events {
            total.absorb(self.publish(ev));
        }
        total
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Category, Region};
    use chrono::Utc;
    use parking_lot::Mutex;

    fn ev(id: &str) -> Arc<NormalizedEvent> {
        Arc::new(NormalizedEvent {
            id: id.to_string(),
            timestamp: Utc::now(),
            headline: format!("headline {id}"),
            description: String::new(),
            source: "Test".into(),
            url: format!("https://example.test/{id}"),
            category: Category::General,
            region: Region::Global,
            credibility: 75,
            sentiment: None,
            synthetic: false,
        })
    }

    fn recorder(bus: &EventBus, name: &str, log: &Arc<Mutex<Vec<String>>>) -> SubscriptionId {
        let log = Arc::clone(log);
        let tag = name.to_string();
        bus.subscribe(name, move |e| {
            log.lock().push(format!("{tag}:{}", e.id));
            Ok(())
        })
    }

    #[test]
    fn fan_out_in_publish_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, "a", &log);
        recorder(&bus, "b", &log);

        let r = bus.publish_all([ev("1"), ev("2")]);
        assert_eq!(r, PublishReport { delivered: 4, failed: 0 });
        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn failing_subscriber_does_not_block_later_ones() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("broken", |_| Err(anyhow::anyhow!("downstream offline")));
        bus.subscribe("panicky", |_| panic!("boom"));
        recorder(&bus, "ok", &log);

        let r = bus.publish(ev("x"));
        assert_eq!(r, PublishReport { delivered: 1, failed: 2 });
        assert_eq!(*log.lock(), vec!["ok:x"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&bus, "a", &log);
        recorder(&bus, "b", &log);
        assert_eq!(bus.subscriber_count(), 2);

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        bus.publish(ev("1"));
        assert_eq!(*log.lock(), vec!["b:1"]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_delivery() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicU64::new(0));

        let (b, s, h) = (Arc::clone(&bus), Arc::clone(&slot), Arc::clone(&hits));
        let id = bus.subscribe("once", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *s.lock() {
                b.unsubscribe(id);
            }
            Ok(())
        });
        *slot.lock() = Some(id);

        bus.publish(ev("1"));
        bus.publish(ev("2"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(ev("1")), PublishReport::default());
    }
}
