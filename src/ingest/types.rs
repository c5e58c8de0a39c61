// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{Category, Region};
use crate::ingest::error::FetchError;

/// Provider output before relevance filtering and normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub url: String,
    pub title: String,
    pub description: String,
    pub source: String, // publisher as reported by the provider, e.g. "Reuters"
    pub published_at: Option<DateTime<Utc>>,
    pub sentiment: Option<f64>,
}

/// Provider-agnostic event; immutable once built and shared as `Arc<NormalizedEvent>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub headline: String,
    pub description: String,
    pub source: String,
    pub url: String,
    pub category: Category,
    pub region: Region,
    pub credibility: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub synthetic: bool,
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// One page of raw items, in upstream order.
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError>;

    /// Pre-normalization allow-list; adapters over filtered feeds keep everything.
    fn is_relevant(&self, _item: &RawItem) -> bool {
        true
    }

    fn normalize(&self, item: RawItem) -> NormalizedEvent;
}
