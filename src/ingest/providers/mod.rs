// src/ingest/providers/mod.rs
pub mod alphavantage;
pub mod newsapi;
pub mod rss;

use std::sync::Arc;

use crate::classify::RelevanceFilter;
use crate::credibility::CredibilityTable;
use crate::ingest::config::{resolve_api_key, IngestConfig, SourceConfig};
use crate::ingest::error::FetchError;
use crate::ingest::types::SourceAdapter;

use alphavantage::AlphaVantageAdapter;
use newsapi::NewsApiAdapter;
use rss::RssAdapter;

pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_ALPHA_VANTAGE_KEY: &str = "ALPHA_VANTAGE_KEY";

/// GET `url` with `query`, failing on transport errors and non-2xx statuses.
pub(crate) async fn http_get_text(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String, FetchError> {
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FetchError::Http {
            provider: provider.to_string(),
            source: e,
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    resp.text().await.map_err(|e| FetchError::Http {
        provider: provider.to_string(),
        source: e,
    })
}

/// Build HTTP adapters for every configured source, in configuration order.
/// Sources whose API key cannot be resolved are skipped with a warning.
pub fn build_adapters(
    cfg: &IngestConfig,
    client: &reqwest::Client,
    credibility: Arc<CredibilityTable>,
    relevance: &RelevanceFilter,
) -> Vec<Arc<dyn SourceAdapter>> {
    let mut out: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(cfg.sources.len());
    for src in &cfg.sources {
        match src {
            SourceConfig::NewsApi {
                name,
                url,
                api_key,
                query,
                language,
            } => {
                let Some(key) = resolve_api_key(api_key, ENV_NEWS_API_KEY) else {
                    tracing::warn!(target: "ingest", source = %name, "no api key; source disabled");
                    continue;
                };
                out.push(Arc::new(
                    NewsApiAdapter::from_url(name, url, &key, client.clone())
                        .with_query(query, language)
                        .with_relevance(relevance.clone())
                        .with_credibility(Arc::clone(&credibility)),
                ));
            }
            SourceConfig::AlphaVantage {
                name,
                url,
                api_key,
                topics,
            } => {
                let Some(key) = resolve_api_key(api_key, ENV_ALPHA_VANTAGE_KEY) else {
                    tracing::warn!(target: "ingest", source = %name, "no api key; source disabled");
                    continue;
                };
                out.push(Arc::new(
                    AlphaVantageAdapter::from_url(name, url, &key, client.clone())
                        .with_topics(topics)
                        .with_credibility(Arc::clone(&credibility)),
                ));
            }
            SourceConfig::Rss { name, url } => {
                out.push(Arc::new(
                    RssAdapter::from_url(name, url, client.clone())
                        .with_relevance(relevance.clone())
                        .with_credibility(Arc::clone(&credibility)),
                ));
            }
        }
    }
    out
}
