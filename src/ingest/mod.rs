// src/ingest/mod.rs
pub mod config;
pub mod error;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::classify::{Category, Region};
use crate::ingest::error::FetchError;
use crate::ingest::types::{NormalizedEvent, RawItem, SourceAdapter};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_ticks_total", "Completed scheduler ticks.");
        describe_counter!("ingest_items_total", "Raw items returned by adapters.");
        describe_counter!(
            "ingest_filtered_total",
            "Raw items dropped by the relevance allow-list."
        );
        describe_counter!(
            "ingest_published_total",
            "Normalized events handed to the event bus."
        );
        describe_counter!(
            "ingest_adapter_errors_total",
            "Adapter fetch failures (http, status, malformed, timeout)."
        );
        describe_histogram!("ingest_fetch_ms", "Adapter fetch time in milliseconds.");
        describe_gauge!("ingest_last_tick_ts", "Unix ts when the last tick finished.");
        describe_counter!("bus_published_total", "Events published on the bus.");
        describe_counter!(
            "bus_handler_errors_total",
            "Subscriber failures during delivery."
        );
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const MAX_TEXT_CHARS: usize = 1500;

/// Normalize text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (a tag separates words)
    out = RE_TAGS.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out = RE_WS.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Stable event id: first 8 bytes of SHA-256 over the URL, hex encoded.
pub fn event_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Normalize the free-text fields of a raw item so relevance checks and
/// classification only see text that ends up in the event.
pub fn clean_item(mut item: RawItem) -> RawItem {
    item.title = normalize_text(&item.title);
    item.description = normalize_text(&item.description);
    item.source = normalize_text(&item.source);
    item
}

/// Shared tail of every adapter's `normalize`: id, text cleanup, timestamp fallback.
pub fn assemble_event(
    item: RawItem,
    category: Category,
    region: Region,
    credibility: u8,
) -> NormalizedEvent {
    let url = item.url.trim().to_string();
    NormalizedEvent {
        id: event_id(&url),
        timestamp: item.published_at.unwrap_or_else(Utc::now),
        headline: normalize_text(&item.title),
        description: normalize_text(&item.description),
        source: normalize_text(&item.source),
        url,
        category,
        region,
        credibility: credibility.min(100),
        sentiment: item.sentiment,
        synthetic: false,
    }
}

/// fetch → relevance filter → normalize, keeping upstream order.
pub async fn collect(adapter: &dyn SourceAdapter) -> Result<Vec<NormalizedEvent>, FetchError> {
    let raw = adapter.fetch().await?;
    Ok(filter_and_normalize(adapter, raw))
}

/// Like [`collect`], but abandons the fetch once `timeout` elapses.
pub async fn collect_with_timeout(
    adapter: &dyn SourceAdapter,
    timeout: Duration,
) -> Result<Vec<NormalizedEvent>, FetchError> {
    ensure_metrics_described();
    let t0 = Instant::now();
    let fetched = tokio::time::timeout(timeout, adapter.fetch()).await;
    histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let raw = match fetched {
        Ok(res) => res?,
        Err(_) => {
            return Err(FetchError::Timeout {
                provider: adapter.name().to_string(),
                elapsed: timeout,
            })
        }
    };
    Ok(filter_and_normalize(adapter, raw))
}

fn filter_and_normalize(adapter: &dyn SourceAdapter, raw: Vec<RawItem>) -> Vec<NormalizedEvent> {
    let total = raw.len();
    let events: Vec<NormalizedEvent> = raw
        .into_iter()
        .map(clean_item)
        .filter(|it| adapter.is_relevant(it))
        .map(|it| adapter.normalize(it))
        .collect();

    counter!("ingest_items_total").increment(total as u64);
    counter!("ingest_filtered_total").increment((total - events.len()) as u64);
    events
}

/// Result of invoking a set of adapters once.
#[derive(Debug, Default)]
pub struct Batch {
    /// Adapter order first, upstream order within an adapter.
    pub events: Vec<NormalizedEvent>,
    pub failures: Vec<FetchError>,
}

/// Invoke every adapter sequentially in the given order. A failing adapter is
/// logged and skipped; the rest still run.
pub async fn run_adapters(adapters: &[Arc<dyn SourceAdapter>], timeout: Duration) -> Batch {
    let mut batch = Batch::default();
    for adapter in adapters {
        match collect_with_timeout(adapter.as_ref(), timeout).await {
            Ok(mut events) => {
                tracing::debug!(
                    target: "ingest",
                    adapter = adapter.name(),
                    events = events.len(),
                    "adapter fetched"
                );
                batch.events.append(&mut events);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, adapter = adapter.name(), "adapter error");
                counter!("ingest_adapter_errors_total", "kind" => e.kind()).increment(1);
                batch.failures.push(e);
            }
        }
    }
    batch
}
