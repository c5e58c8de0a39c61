//! # Source Credibility
//!
//! Maps publisher names (e.g. "Reuters", "BBC News") to an integer credibility
//! score in `[0, 100]`.
//!
//! - Built-in seed with the wire services and broadcasters seen in the feeds.
//! - Case-insensitive lookup with punctuation/dash normalization.
//! - Aliases map alternative spellings to canonical names.
//! - Overrides from configuration replace or extend the seed.
//! - Unknown sources fall back to `default_score` (75), or to a
//!   caller-supplied fallback for providers that vouch for their own feed.

use std::collections::HashMap;

pub const DEFAULT_CREDIBILITY: u8 = 75;

#[derive(Debug, Clone)]
pub struct CredibilityTable {
    pub default_score: u8,
    scores: HashMap<String, u8>,
    aliases: HashMap<String, String>,
}

impl Default for CredibilityTable {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl CredibilityTable {
    pub fn default_seed() -> Self {
        let mut scores = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("reuters", 95),
            ("bloomberg", 93),
            ("financial times", 91),
            ("associated press", 94),
            ("bbc news", 89),
            ("cnn", 82),
            ("fox news", 78),
        ] {
            scores.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("ap", "associated press"),
            ("the associated press", "associated press"),
            ("ft", "financial times"),
            ("bbc", "bbc news"),
            ("reuters com", "reuters"),
            ("bloomberg news", "bloomberg"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_score: DEFAULT_CREDIBILITY,
            scores,
            aliases,
        }
    }

    /// Seed plus configured overrides. Scores above 100 are clamped.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a u32)>,
    {
        for (name, &score) in overrides {
            let key = normalize(name);
            if key.is_empty() {
                continue;
            }
            self.scores.insert(key, clamp100(score));
        }
        self
    }

    /// Score for `source`, or [`CredibilityTable::default_score`] when unknown.
    pub fn score_for(&self, source: &str) -> u8 {
        self.score_or(source, self.default_score)
    }

    /// Score for `source`, or `fallback` when unknown.
    ///
    /// Lookup order: alias → exact (normalized) match → fallback.
    pub fn score_or(&self, source: &str, fallback: u8) -> u8 {
        let s = normalize(source);

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&v) = self.scores.get(&normalize(canon)) {
                return v.min(100);
            }
        }

        if let Some(&v) = self.scores.get(&s) {
            return v.min(100);
        }

        fallback.min(100)
    }
}

/// Lowercase, fold separators/punctuation to spaces, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp100(x: u32) -> u8 {
    x.min(100) as u8
}
