//! recent.rs: bounded in-memory buffer of the latest events, fed by the bus.
//! Backs `GET /api/events`; nothing here survives a restart.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::bus::{EventBus, SubscriptionId};
use crate::classify::{Category, Region};
use crate::ingest::types::NormalizedEvent;

#[derive(Debug)]
pub struct RecentEvents {
    inner: Mutex<Inner>,
    cap: usize,
}

#[derive(Debug, Default)]
struct Inner {
    /// Oldest at the front.
    buf: VecDeque<Arc<NormalizedEvent>>,
    ids: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub offset: usize,
    pub limit: usize,
    pub category: Option<Category>,
    pub region: Option<Region>,
}

impl EventQuery {
    fn matches(&self, ev: &NormalizedEvent) -> bool {
        self.category.map_or(true, |c| c == ev.category)
            && self.region.map_or(true, |r| r == ev.region)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    /// Matching events before paging.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub events: Vec<NormalizedEvent>,
}

impl RecentEvents {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(cap.min(10_000)),
                ids: HashSet::new(),
            }),
            cap,
        }
    }

    /// Store `ev` unless an event with the same id is already held.
    /// Returns whether it was inserted.
    pub fn push(&self, ev: Arc<NormalizedEvent>) -> bool {
        let mut inner = self.inner.lock();
        if !inner.ids.insert(ev.id.clone()) {
            return false;
        }
        inner.buf.push_back(ev);
        while inner.buf.len() > self.cap {
            if let Some(old) = inner.buf.pop_front() {
                inner.ids.remove(&old.id);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest first, filtered, then paged.
    pub fn query(&self, q: &EventQuery) -> EventPage {
        let inner = self.inner.lock();
        let matching = inner.buf.iter().rev().filter(|ev| q.matches(ev));
        let total = matching.clone().count();
        let events = matching
            .skip(q.offset)
            .take(q.limit)
            .map(|ev| ev.as_ref().clone())
            .collect();
        EventPage {
            total,
            offset: q.offset,
            limit: q.limit,
            events,
        }
    }

    /// Subscribe this store to `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        let store = Arc::clone(self);
        bus.subscribe("recent-events", move |ev| {
            store.push(Arc::clone(ev));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ev(id: &str, category: Category, region: Region) -> Arc<NormalizedEvent> {
        Arc::new(NormalizedEvent {
            id: id.to_string(),
            timestamp: Utc::now(),
            headline: id.to_string(),
            description: String::new(),
            source: "Test".into(),
            url: format!("https://example.test/{id}"),
            category,
            region,
            credibility: 75,
            sentiment: None,
            synthetic: false,
        })
    }

    fn ids(page: &EventPage) -> Vec<&str> {
        page.events.iter().map(|e| e.id.as_str()).collect()
    }

    fn all(limit: usize) -> EventQuery {
        EventQuery {
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn duplicates_by_id_are_ignored() {
        let r = RecentEvents::with_capacity(10);
        assert!(r.push(ev("a", Category::General, Region::Global)));
        assert!(!r.push(ev("a", Category::Military, Region::Europe)));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest_and_forgets_its_id() {
        let r = RecentEvents::with_capacity(2);
        for id in ["a", "b", "c"] {
            r.push(ev(id, Category::General, Region::Global));
        }
        assert_eq!(ids(&r.query(&all(10))), vec!["c", "b"]);
        // "a" was evicted, so it is accepted again.
        assert!(r.push(ev("a", Category::General, Region::Global)));
    }

    #[test]
    fn newest_first_with_paging() {
        let r = RecentEvents::with_capacity(10);
        for id in ["1", "2", "3", "4", "5"] {
            r.push(ev(id, Category::General, Region::Global));
        }
        let page = r.query(&EventQuery {
            offset: 1,
            limit: 2,
            ..Default::default()
        });
        assert_eq!(page.total, 5);
        assert_eq!(ids(&page), vec!["4", "3"]);
    }

    #[test]
    fn filters_apply_before_paging() {
        let r = RecentEvents::with_capacity(10);
        r.push(ev("m1", Category::Military, Region::Europe));
        r.push(ev("e1", Category::Economic, Region::Europe));
        r.push(ev("m2", Category::Military, Region::AsiaPacific));

        let page = r.query(&EventQuery {
            limit: 10,
            category: Some(Category::Military),
            ..Default::default()
        });
        assert_eq!(ids(&page), vec!["m2", "m1"]);

        let page = r.query(&EventQuery {
            limit: 10,
            category: Some(Category::Military),
            region: Some(Region::Europe),
            ..Default::default()
        });
        assert_eq!(page.total, 1);
        assert_eq!(ids(&page), vec!["m1"]);
    }

    #[test]
    fn attach_stores_published_events() {
        let bus = EventBus::new();
        let r = Arc::new(RecentEvents::with_capacity(10));
        let sub = r.attach(&bus);
        bus.publish(ev("x", Category::General, Region::Global));
        assert_eq!(r.len(), 1);
        bus.unsubscribe(sub);
        bus.publish(ev("y", Category::General, Region::Global));
        assert_eq!(r.len(), 1);
    }
}
