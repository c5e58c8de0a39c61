// src/ingest/providers/alphavantage.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::classify::{locate_region, Category};
use crate::credibility::CredibilityTable;
use crate::ingest::assemble_event;
use crate::ingest::error::FetchError;
use crate::ingest::providers::http_get_text;
use crate::ingest::types::{NormalizedEvent, RawItem, SourceAdapter};

pub const DEFAULT_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_TOPICS: &str = "political_risk,international_trade";

/// Score for publishers missing from the credibility table; the feed is curated.
/// Departs from the generic unknown-source default of 75.
pub const PROVIDER_CREDIBILITY: u8 = 85;

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    feed: Option<Vec<FeedItem>>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    title: Option<String>,
    url: Option<String>,
    time_published: Option<String>,
    summary: Option<String>,
    source: Option<String>,
    overall_sentiment_score: Option<Value>,
}

/// News-sentiment feed. Every item is economic; sentiment comes from upstream.
pub struct AlphaVantageAdapter {
    name: String,
    mode: Mode,
    topics: String,
    credibility: Arc<CredibilityTable>,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        api_key: String,
        client: reqwest::Client,
    },
}

impl AlphaVantageAdapter {
    fn with_mode(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            topics: DEFAULT_TOPICS.to_string(),
            credibility: Arc::new(CredibilityTable::default_seed()),
        }
    }

    pub fn from_fixture(json: &str) -> Self {
        Self::with_mode("AlphaVantage", Mode::Fixture(json.to_string()))
    }

    pub fn from_url(name: &str, url: &str, api_key: &str, client: reqwest::Client) -> Self {
        Self::with_mode(
            name,
            Mode::Http {
                url: url.to_string(),
                api_key: api_key.to_string(),
                client,
            },
        )
    }

    pub fn with_topics(mut self, topics: &str) -> Self {
        self.topics = topics.to_string();
        self
    }

    pub fn with_credibility(mut self, credibility: Arc<CredibilityTable>) -> Self {
        self.credibility = credibility;
        self
    }

    fn parse_items(&self, body: &str) -> Result<Vec<RawItem>, FetchError> {
        let payload: Payload =
            serde_json::from_str(body).map_err(|e| FetchError::malformed(&self.name, e))?;

        let Some(feed) = payload.feed else {
            // Rate limiting and key problems arrive as 200 + a message.
            if let Some(msg) = payload.information.or(payload.note) {
                tracing::warn!(target: "ingest", adapter = %self.name, message = %msg, "no feed in payload");
            }
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(feed.len());
        for it in feed {
            let Some(url) = it.url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            out.push(RawItem {
                url,
                title: it.title.unwrap_or_default(),
                description: it.summary.unwrap_or_default(),
                source: it.source.unwrap_or_default(),
                published_at: it.time_published.as_deref().and_then(parse_time_published),
                sentiment: it.overall_sentiment_score.as_ref().and_then(score_value),
            });
        }
        Ok(out)
    }
}

/// `20240115T123000` (seconds optional), always UTC.
fn parse_time_published(ts: &str) -> Option<DateTime<Utc>> {
    ["%Y%m%dT%H%M%S", "%Y%m%dT%H%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(ts.trim(), fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Upstream sends numbers, occasionally as strings.
fn score_value(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items(s),
            Mode::Http {
                url,
                api_key,
                client,
            } => {
                let body = http_get_text(
                    client,
                    &self.name,
                    url,
                    &[
                        ("function", "NEWS_SENTIMENT"),
                        ("topics", self.topics.as_str()),
                        ("apikey", api_key.as_str()),
                    ],
                )
                .await?;
                self.parse_items(&body)
            }
        }
    }

    /// Only items carrying a non-zero sentiment score.
    fn is_relevant(&self, item: &RawItem) -> bool {
        item.sentiment.is_some_and(|s| s != 0.0)
    }

    fn normalize(&self, item: RawItem) -> NormalizedEvent {
        let region = locate_region(&item.title);
        let credibility = self.credibility.score_or(&item.source, PROVIDER_CREDIBILITY);
        assemble_event(item, Category::Economic, region, credibility)
    }
}
