// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::{alphavantage, newsapi};

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const ENV_INTERVAL_SECS: &str = "INGEST_INTERVAL_SECS";

pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Tick cadence.
    pub interval_secs: u64,
    /// Budget for a single adapter fetch.
    pub fetch_timeout_secs: u64,
    /// Events kept for `GET /api/events`.
    pub recent_capacity: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Per-WebSocket-client event buffer.
    pub ws_buffer: usize,
    /// Replaces the built-in relevance allow-list when set.
    pub relevance_keywords: Option<Vec<String>>,
    /// Source name → credibility score overrides.
    pub credibility: HashMap<String, u32>,
    pub sources: Vec<SourceConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            recent_capacity: 1000,
            default_limit: DEFAULT_LIMIT,
            max_limit: 500,
            ws_buffer: 64,
            relevance_keywords: None,
            credibility: HashMap::new(),
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum SourceConfig {
    #[serde(rename = "newsapi")]
    NewsApi {
        #[serde(default = "default_newsapi_name")]
        name: String,
        #[serde(default = "default_newsapi_url")]
        url: String,
        #[serde(default = "env_marker")]
        api_key: String,
        #[serde(default = "default_newsapi_query")]
        query: String,
        #[serde(default = "default_language")]
        language: String,
    },
    #[serde(rename = "alphavantage")]
    AlphaVantage {
        #[serde(default = "default_alphavantage_name")]
        name: String,
        #[serde(default = "default_alphavantage_url")]
        url: String,
        #[serde(default = "env_marker")]
        api_key: String,
        #[serde(default = "default_alphavantage_topics")]
        topics: String,
    },
    #[serde(rename = "rss")]
    Rss { name: String, url: String },
}

fn default_newsapi_name() -> String {
    "NewsAPI".into()
}
fn default_newsapi_url() -> String {
    newsapi::DEFAULT_URL.into()
}
fn default_newsapi_query() -> String {
    newsapi::DEFAULT_QUERY.into()
}
fn default_language() -> String {
    "en".into()
}
fn default_alphavantage_name() -> String {
    "AlphaVantage".into()
}
fn default_alphavantage_url() -> String {
    alphavantage::DEFAULT_URL.into()
}
fn default_alphavantage_topics() -> String {
    alphavantage::DEFAULT_TOPICS.into()
}
fn env_marker() -> String {
    "ENV".into()
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::NewsApi {
            name: default_newsapi_name(),
            url: default_newsapi_url(),
            api_key: env_marker(),
            query: default_newsapi_query(),
            language: default_language(),
        },
        SourceConfig::AlphaVantage {
            name: default_alphavantage_name(),
            url: default_alphavantage_url(),
            api_key: env_marker(),
            topics: default_alphavantage_topics(),
        },
    ]
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ingest config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing ingest config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $INGEST_CONFIG_PATH
    /// 2) config/ingest.toml
    /// 3) config/ingest.json
    /// 4) built-in defaults
    ///
    /// `$INGEST_INTERVAL_SECS` overrides the interval afterwards.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/ingest.toml");
            let json_p = PathBuf::from("config/ingest.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };

        if let Some(secs) = parse_interval_env(std::env::var(ENV_INTERVAL_SECS).ok()) {
            cfg.interval_secs = secs;
        }
        Ok(cfg)
    }

    /// Clamp nonsensical values instead of failing startup.
    fn sanitized(mut self) -> Self {
        self.interval_secs = self.interval_secs.max(1);
        self.fetch_timeout_secs = self.fetch_timeout_secs.max(1);
        self.recent_capacity = self.recent_capacity.max(1);
        self.default_limit = self.default_limit.max(1);
        self.max_limit = self.max_limit.max(self.default_limit);
        self.ws_buffer = self.ws_buffer.max(1);
        self
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).map_err(Into::into);
    }
    match toml::from_str(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s).map_err(|_| anyhow!(toml_err)),
    }
}

fn parse_interval_env(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&v| v >= 1)
}

/// Resolve an API key setting:
/// - `"ENV"` → the provider's conventional variable (`fallback_env`)
/// - `"env:NAME"` → variable `NAME`
/// - anything else non-empty → used literally
pub fn resolve_api_key(raw: &str, fallback_env: &str) -> Option<String> {
    let raw = raw.trim();
    let from_env = |name: &str| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if raw.eq_ignore_ascii_case("env") {
        return from_env(fallback_env);
    }
    if let Some(name) = raw.strip_prefix("env:") {
        return from_env(name.trim());
    }
    (!raw.is_empty()).then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_with_sources_and_defaults() {
        let toml = r#"
interval_secs = 60
relevance_keywords = ["pandemic"]

[credibility]
"Al Jazeera" = 84

[[sources]]
kind = "newsapi"
api_key = "literal-key"

[[sources]]
kind = "rss"
name = "BBC News"
url = "https://feeds.bbci.co.uk/news/world/rss.xml"
"#;
        let cfg = parse_config(toml, "toml").unwrap().sanitized();
        assert_eq!(cfg.interval_secs, 60);
        assert_eq!(cfg.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(cfg.default_limit, DEFAULT_LIMIT);
        assert_eq!(cfg.relevance_keywords, Some(vec!["pandemic".to_string()]));
        assert_eq!(cfg.credibility.get("Al Jazeera"), Some(&84));
        assert_eq!(cfg.sources.len(), 2);
        match &cfg.sources[0] {
            SourceConfig::NewsApi { name, url, api_key, .. } => {
                assert_eq!(name, "NewsAPI");
                assert_eq!(url, newsapi::DEFAULT_URL);
                assert_eq!(api_key, "literal-key");
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert!(matches!(&cfg.sources[1], SourceConfig::Rss { name, .. } if name == "BBC News"));
    }

    #[test]
    fn json_is_accepted_and_sanitized() {
        let json = r#"{"interval_secs": 0, "default_limit": 80, "max_limit": 10, "sources": []}"#;
        let cfg = parse_config(json, "json").unwrap().sanitized();
        assert_eq!(cfg.interval_secs, 1);
        assert_eq!(cfg.max_limit, 80);
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn unknown_source_kind_is_rejected() {
        let toml = r#"
[[sources]]
kind = "carrier-pigeon"
"#;
        assert!(parse_config(toml, "toml").is_err());
    }

    #[test]
    fn empty_file_means_builtin_sources() {
        let cfg = parse_config("", "toml").unwrap();
        assert_eq!(cfg.sources, default_sources());
        assert_eq!(cfg.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn interval_env_parsing() {
        assert_eq!(parse_interval_env(Some(" 120 ".into())), Some(120));
        assert_eq!(parse_interval_env(Some("0".into())), None);
        assert_eq!(parse_interval_env(Some("soon".into())), None);
        assert_eq!(parse_interval_env(None), None);
    }

    #[serial_test::serial]
    #[test]
    fn api_key_resolution() {
        env::set_var("CRISIS_TEST_KEY", " abc ");
        assert_eq!(resolve_api_key("ENV", "CRISIS_TEST_KEY"), Some("abc".into()));
        assert_eq!(
            resolve_api_key("env:CRISIS_TEST_KEY", "UNUSED"),
            Some("abc".into())
        );
        assert_eq!(resolve_api_key("plain", "UNUSED"), Some("plain".into()));
        assert_eq!(resolve_api_key("  ", "UNUSED"), None);
        env::remove_var("CRISIS_TEST_KEY");
        assert_eq!(resolve_api_key("env", "CRISIS_TEST_KEY"), None);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Keep the repo's own config/ out of the picture.
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_INTERVAL_SECS);

        // Nothing on disk → built-ins
        let cfg = IngestConfig::load_default().unwrap();
        assert_eq!(cfg.interval_secs, DEFAULT_INTERVAL_SECS);

        // ./config/ingest.toml
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join("config/ingest.toml"), "interval_secs = 30").unwrap();
        assert_eq!(IngestConfig::load_default().unwrap().interval_secs, 30);

        // Env path wins, env interval wins over file
        let p_json = tmp.path().join("custom.json");
        fs::write(&p_json, r#"{"interval_secs": 45}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_json.display().to_string());
        assert_eq!(IngestConfig::load_default().unwrap().interval_secs, 45);
        env::set_var(ENV_INTERVAL_SECS, "7");
        assert_eq!(IngestConfig::load_default().unwrap().interval_secs, 7);

        // Dangling env path is an error
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(IngestConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_INTERVAL_SECS);
        env::set_current_dir(&old).unwrap();
    }
}
