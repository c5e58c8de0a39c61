// src/classify.rs
//! Event classifier: keyword tables mapping free text to a category and a region,
//! plus the relevance allow-list used by unfiltered news feeds.
//!
//! Matching is a case-insensitive substring scan. Table order is significant:
//! the first entry whose keyword set matches wins, so e.g. "cyber attack"
//! resolves to `military` ("attack") before `cyber_security` is ever checked.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Political,
    Economic,
    Military,
    CyberSecurity,
    SupplyChain,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Political => "political",
            Category::Economic => "economic",
            Category::Military => "military",
            Category::CyberSecurity => "cyber_security",
            Category::SupplyChain => "supply_chain",
            Category::General => "general",
        }
    }

    /// Inverse of [`Category::as_str`]; used for query-string filters.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        [
            Category::Political,
            Category::Economic,
            Category::Military,
            Category::CyberSecurity,
            Category::SupplyChain,
            Category::General,
        ]
        .into_iter()
        .find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "Europe")]
    Europe,
    #[serde(rename = "Asia-Pacific")]
    AsiaPacific,
    #[serde(rename = "Middle East")]
    MiddleEast,
    #[serde(rename = "Africa")]
    Africa,
    #[serde(rename = "Latin America")]
    LatinAmerica,
    #[serde(rename = "Global")]
    Global,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "North America",
            Region::Europe => "Europe",
            Region::AsiaPacific => "Asia-Pacific",
            Region::MiddleEast => "Middle East",
            Region::Africa => "Africa",
            Region::LatinAmerica => "Latin America",
            Region::Global => "Global",
        }
    }

    /// Accepts the display name case-insensitively ("asia-pacific", "Middle East").
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            Region::NorthAmerica,
            Region::Europe,
            Region::AsiaPacific,
            Region::MiddleEast,
            Region::Africa,
            Region::LatinAmerica,
            Region::Global,
        ]
        .into_iter()
        .find(|r| r.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ----------------------------
Keyword tables (order = priority)
---------------------------- */

const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Military,
        &["military", "war", "conflict", "attack", "invasion"],
    ),
    (
        Category::Economic,
        &["trade", "sanctions", "economy", "market", "currency"],
    ),
    (
        Category::Political,
        &["election", "government", "diplomatic", "policy"],
    ),
    (Category::CyberSecurity, &["cyber", "hack", "breach", "malware"]),
    (
        Category::SupplyChain,
        &["supply", "shipping", "logistics", "port"],
    ),
];

const REGION_TABLE: &[(Region, &[&str])] = &[
    (
        Region::NorthAmerica,
        &["usa", "united states", "canada", "mexico"],
    ),
    (
        Region::Europe,
        &["europe", "eu", "germany", "france", "uk", "russia"],
    ),
    (
        Region::AsiaPacific,
        &["china", "japan", "korea", "taiwan", "australia"],
    ),
    (
        Region::MiddleEast,
        &["iran", "israel", "saudi", "turkey", "syria"],
    ),
    (
        Region::Africa,
        &["africa", "nigeria", "south africa", "egypt"],
    ),
    (
        Region::LatinAmerica,
        &["brazil", "argentina", "venezuela", "colombia"],
    ),
];

pub const DEFAULT_RELEVANCE_KEYWORDS: &[&str] = &[
    "sanctions",
    "conflict",
    "war",
    "crisis",
    "diplomatic",
    "trade war",
    "embargo",
    "political",
    "military",
    "coup",
    "election",
    "protest",
    "terrorism",
    "cyber attack",
    "supply chain",
    "energy crisis",
    "currency",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub region: Region,
}

/// First matching entry of `table` wins; `fallback` when nothing matches.
fn first_match<T: Copy>(table: &[(T, &[&str])], text: &str, fallback: T) -> T {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(value, _)| *value)
        .unwrap_or(fallback)
}

pub fn categorize(text: &str) -> Category {
    first_match(CATEGORY_TABLE, text, Category::General)
}

pub fn locate_region(text: &str) -> Region {
    first_match(REGION_TABLE, text, Region::Global)
}

/// Classify one piece of text. Total: never fails, always exactly one value each.
pub fn classify(text: &str) -> Classification {
    Classification {
        category: categorize(text),
        region: locate_region(text),
    }
}

/// Keyword allow-list applied to cleaned item text, before normalization, by adapters whose raw feed is unfiltered.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_RELEVANCE_KEYWORDS.iter().copied())
    }
}

impl RelevanceFilter {
    /// Keywords are trimmed and lowercased; blanks are dropped.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
