// src/ingest/providers/rss.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::classify::{categorize, locate_region, RelevanceFilter};
use crate::credibility::CredibilityTable;
use crate::ingest::assemble_event;
use crate::ingest::error::FetchError;
use crate::ingest::providers::http_get_text;
use crate::ingest::types::{NormalizedEvent, RawItem, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// RSS 2.0 feed of a single publisher; `name` doubles as the event source.
pub struct RssAdapter {
    name: String,
    mode: Mode,
    relevance: RelevanceFilter,
    credibility: Arc<CredibilityTable>,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssAdapter {
    fn with_mode(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            relevance: RelevanceFilter::default(),
            credibility: Arc::new(CredibilityTable::default_seed()),
        }
    }

    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self::with_mode(name, Mode::Fixture(xml.to_string()))
    }

    pub fn from_url(name: &str, url: &str, client: reqwest::Client) -> Self {
        Self::with_mode(
            name,
            Mode::Http {
                url: url.to_string(),
                client,
            },
        )
    }

    pub fn with_relevance(mut self, relevance: RelevanceFilter) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_credibility(mut self, credibility: Arc<CredibilityTable>) -> Self {
        self.credibility = credibility;
        self
    }

    fn parse_items(&self, s: &str) -> Result<Vec<RawItem>, FetchError> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::malformed(&self.name, e))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let Some(url) = it.link.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            out.push(RawItem {
                url,
                title: it.title.unwrap_or_default(),
                description: it.description.unwrap_or_default(),
                source: self.name.clone(),
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
                sentiment: None,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items(s),
            Mode::Http { url, client } => {
                let body = http_get_text(client, &self.name, url, &[]).await?;
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

/// XML only knows five named entities; feeds routinely use HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
