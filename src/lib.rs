// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bus;
pub mod classify;
pub mod credibility;
pub mod ingest;
pub mod metrics;
pub mod recent;

pub use crate::api::{router, AppState};

use std::sync::Arc;

use anyhow::Context;

use crate::api::Limits;
use crate::bus::EventBus;
use crate::classify::RelevanceFilter;
use crate::credibility::CredibilityTable;
use crate::ingest::config::IngestConfig;
use crate::ingest::providers::build_adapters;
use crate::ingest::scheduler::{IngestScheduler, IngestSchedulerCfg};
use crate::ingest::types::SourceAdapter;
use crate::recent::RecentEvents;

/// Wire bus, recent-events store and scheduler for `cfg`, building HTTP
/// adapters for every configured source.
pub fn build_state(cfg: &IngestConfig) -> anyhow::Result<AppState> {
    let client = reqwest::Client::builder()
        .timeout(cfg.fetch_timeout())
        .user_agent(concat!("crisis-ingest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let credibility = Arc::new(CredibilityTable::default_seed().with_overrides(&cfg.credibility));
    let relevance = match &cfg.relevance_keywords {
        Some(words) => RelevanceFilter::new(words),
        None => RelevanceFilter::default(),
    };
    let adapters = build_adapters(cfg, &client, Arc::clone(&credibility), &relevance);

    Ok(build_state_with(cfg, adapters, credibility))
}

/// Same wiring as [`build_state`] but with caller-supplied adapters.
pub fn build_state_with(
    cfg: &IngestConfig,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    credibility: Arc<CredibilityTable>,
) -> AppState {
    let bus = Arc::new(EventBus::new());
    let recent = Arc::new(RecentEvents::with_capacity(cfg.recent_capacity));
    recent.attach(&bus);

    let scheduler = Arc::new(
        IngestScheduler::new(
            Arc::clone(&bus),
            IngestSchedulerCfg {
                interval: cfg.interval(),
                fetch_timeout: cfg.fetch_timeout(),
            },
        )
        .with_adapters(adapters),
    );

    AppState {
        bus,
        recent,
        scheduler,
        credibility,
        limits: Limits {
            default_limit: cfg.default_limit,
            max_limit: cfg.max_limit,
            ws_buffer: cfg.ws_buffer,
        },
    }
}
