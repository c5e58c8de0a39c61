// src/ingest/scheduler.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::bus::EventBus;
use crate::ingest::types::SourceAdapter;

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for IngestSchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(super::config::DEFAULT_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(super::config::DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Fetching,
    Publishing,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    /// 1-based sequence number of this tick.
    pub tick: u64,
    pub published: usize,
    pub failed_adapters: Vec<String>,
    pub delivery_failures: usize,
    pub finished_at: DateTime<Utc>,
}

/// Periodic ingestion: every tick runs all registered adapters in
/// registration order, then publishes the batch on the bus.
///
/// Ticks are serialized through a single execution slot; a tick requested
/// while another runs (timer or [`IngestScheduler::run_tick`] from elsewhere)
/// waits for it to finish.
pub struct IngestScheduler {
    cfg: IngestSchedulerCfg,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    bus: Arc<EventBus>,
    slot: tokio::sync::Mutex<()>,
    state: Mutex<SchedulerState>,
    ticks: AtomicU64,
    last_tick: Mutex<Option<DateTime<Utc>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Holds the scheduler out of `Idle`; resets it on drop, including when the
/// tick future is cancelled mid-flight.
struct Busy<'a>(&'a Mutex<SchedulerState>);

impl<'a> Busy<'a> {
    fn enter(state: &'a Mutex<SchedulerState>) -> Self {
        *state.lock() = SchedulerState::Fetching;
        Busy(state)
    }

    fn set(&self, s: SchedulerState) {
        *self.0.lock() = s;
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        *self.0.lock() = SchedulerState::Idle;
    }
}

impl IngestScheduler {
    pub fn new(bus: Arc<EventBus>, cfg: IngestSchedulerCfg) -> Self {
        Self {
            cfg,
            adapters: Vec::new(),
            bus,
            slot: tokio::sync::Mutex::new(()),
            state: Mutex::new(SchedulerState::Idle),
            ticks: AtomicU64::new(0),
            last_tick: Mutex::new(None),
            timer: Mutex::new(None),
        }
    }

    /// Register an adapter; invocation order follows registration order.
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_adapters<I>(mut self, adapters: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn SourceAdapter>>,
    {
        self.adapters.extend(adapters);
        self
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.lock()
    }

    pub fn interval(&self) -> Duration {
        self.cfg.interval
    }

    /// Whether the periodic timer is registered.
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Register the periodic timer. The first tick fires immediately.
    /// Returns `false` if it was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.cfg.interval;
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // A slow tick pushes the schedule back instead of bursting afterwards.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else { break };
                this.run_tick().await;
            }
        }));

        tracing::info!(
            target: "ingest",
            interval_secs = period.as_secs(),
            adapters = ?self.adapter_names(),
            "scheduler started"
        );
        true
    }

    /// Cancel the periodic timer (and any tick it is running).
    /// Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let Some(handle) = self.timer.lock().take() else {
            return false;
        };
        let was_running = !handle.is_finished();
        handle.abort();
        tracing::info!(target: "ingest", "scheduler stopped");
        was_running
    }

    /// Run one tick now, waiting for any tick in progress to finish first.
    pub async fn run_tick(&self) -> TickReport {
        let _slot = self.slot.lock().await;
        let busy = Busy::enter(&self.state);

        let batch = crate::ingest::run_adapters(&self.adapters, self.cfg.fetch_timeout).await;

        busy.set(SchedulerState::Publishing);
        let published = batch.events.len();
        let delivery = self
            .bus
            .publish_all(batch.events.into_iter().map(Arc::new));
        drop(busy);

        let finished_at = Utc::now();
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_tick.lock() = Some(finished_at);

        let failed_adapters: Vec<String> = batch
            .failures
            .iter()
            .map(|e| e.provider().to_string())
            .collect();

        counter!("ingest_ticks_total").increment(1);
        counter!("ingest_published_total").increment(published as u64);
        gauge!("ingest_last_tick_ts").set(finished_at.timestamp() as f64);

        tracing::info!(
            target: "ingest",
            tick,
            published,
            failed = ?failed_adapters,
            delivery_failures = delivery.failed,
            "ingest tick"
        );

        TickReport {
            tick,
            published,
            failed_adapters,
            delivery_failures: delivery.failed,
            finished_at,
        }
    }
}

impl Drop for IngestScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}
