//! Typed errors for upstream fetches.

use std::time::Duration;
use thiserror::Error;

/// A single adapter fetch failed. Always recoverable: the adapter
/// contributes zero events to the tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, TLS, body read)
    #[error("{provider}: request failed: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-2xx status
    #[error("{provider}: upstream returned status {status}")]
    Status { provider: String, status: u16 },

    /// Payload could not be decoded into the provider's shape
    #[error("{provider}: malformed payload: {reason}")]
    Malformed { provider: String, reason: String },

    /// The fetch exceeded its time budget and was abandoned
    #[error("{provider}: timed out after {}ms", .elapsed.as_millis())]
    Timeout { provider: String, elapsed: Duration },
}

impl FetchError {
    pub fn provider(&self) -> &str {
        match self {
            FetchError::Http { provider, .. }
            | FetchError::Status { provider, .. }
            | FetchError::Malformed { provider, .. }
            | FetchError::Timeout { provider, .. } => provider,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http { .. } => "http",
            FetchError::Status { .. } => "status",
            FetchError::Malformed { .. } => "malformed",
            FetchError::Timeout { .. } => "timeout",
        }
    }

    pub(crate) fn malformed(provider: &str, reason: impl ToString) -> Self {
        FetchError::Malformed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}
