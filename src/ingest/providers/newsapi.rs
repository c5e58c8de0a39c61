// src/ingest/providers/newsapi.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::classify::{categorize, locate_region, RelevanceFilter};
use crate::credibility::CredibilityTable;
use crate::ingest::assemble_event;
use crate::ingest::error::FetchError;
use crate::ingest::providers::http_get_text;
use crate::ingest::types::{NormalizedEvent, RawItem, SourceAdapter};

pub const DEFAULT_URL: &str = "https://newsapi.org/v2/everything";
pub const DEFAULT_QUERY: &str = "geopolitical OR crisis OR sanctions OR conflict";

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    articles: Option<Vec<Article>>,
}

#[derive(Debug, Deserialize)]
struct Article {
    source: Option<ArticleSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// General news search. The feed is unfiltered, so items pass the relevance
/// allow-list before normalization.
pub struct NewsApiAdapter {
    name: String,
    mode: Mode,
    query: String,
    language: String,
    relevance: RelevanceFilter,
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

impl NewsApiAdapter {
    fn with_mode(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            query: DEFAULT_QUERY.to_string(),
            language: "en".to_string(),
            relevance: RelevanceFilter::default(),
            credibility: Arc::new(CredibilityTable::default_seed()),
        }
    }

    /// Serve a canned JSON payload instead of calling upstream.
    pub fn from_fixture(json: &str) -> Self {
        Self::with_mode("NewsAPI", Mode::Fixture(json.to_string()))
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

    pub fn with_query(mut self, query: &str, language: &str) -> Self {
        self.query = query.to_string();
        self.language = language.to_string();
        self
    }

    pub fn with_relevance(mut self, relevance: RelevanceFilter) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_credibility(mut self, credibility: Arc<CredibilityTable>) -> Self {
        self.credibility = credibility;
        self
    }

    fn parse_items(&self, body: &str) -> Result<Vec<RawItem>, FetchError> {
        let payload: Payload =
            serde_json::from_str(body).map_err(|e| FetchError::malformed(&self.name, e))?;

        let Some(articles) = payload.articles else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(articles.len());
        for a in articles {
            // No url, no stable id.
            let Some(url) = a.url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            out.push(RawItem {
                url,
                title: a.title.unwrap_or_default(),
                description: a.description.unwrap_or_default(),
                source: a.source.and_then(|s| s.name).unwrap_or_default(),
                published_at: a.published_at.as_deref().and_then(parse_rfc3339),
                sentiment: None,
            });
        }
        Ok(out)
    }
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
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
                        ("q", self.query.as_str()),
                        ("language", self.language.as_str()),
                        ("sortBy", "publishedAt"),
                        ("apiKey", api_key.as_str()),
                    ],
                )
                .await?;
                self.parse_items(&body)
            }
        }
    }

    fn is_relevant(&self, item: &RawItem) -> bool {
        self.relevance
            .is_relevant(&format!("{} {}", item.title, item.description))
    }

    fn normalize(&self, item: RawItem) -> NormalizedEvent {
        let category = categorize(&item.title);
        let region = locate_region(&format!("{} {}", item.title, item.description));
        let credibility = self.credibility.score_for(&item.source);
        assemble_event(item, category, region, credibility)
    }
}
