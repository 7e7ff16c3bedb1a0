//! Error types for catalog search.

use std::time::Duration;

use thiserror::Error;

/// Errors a catalog backend can signal for one strategy invocation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The backend asked the caller to back off before retrying.
    #[error("catalog rate limited: retry after {}s", wait.as_secs())]
    RateLimited {
        /// How long the backend asked us to wait.
        wait: Duration,
    },

    /// The backend response could not be decoded.
    #[error("failed to decode catalog response for strategy {strategy}: {source}")]
    Decode {
        /// Name of the strategy whose response failed to decode.
        strategy: &'static str,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Network-level error talking to the backend.
    #[error("catalog request failed for strategy {strategy}: {source}")]
    Http {
        /// Name of the strategy whose request failed.
        strategy: &'static str,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Any other backend failure.
    #[error("catalog backend error for strategy {strategy}: {message}")]
    Backend {
        /// Name of the strategy that failed.
        strategy: &'static str,
        /// Backend-provided detail.
        message: String,
    },
}

impl SearchError {
    /// Creates a rate-limited error with the backend-signaled wait.
    #[must_use]
    pub fn rate_limited(wait: Duration) -> Self {
        Self::RateLimited { wait }
    }

    /// Creates a decode error for the given strategy.
    pub fn decode(strategy: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { strategy, source }
    }

    /// Creates a transport error for the given strategy.
    pub fn http(strategy: &'static str, source: reqwest::Error) -> Self {
        Self::Http { strategy, source }
    }

    /// Creates a generic backend error for the given strategy.
    pub fn backend(strategy: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            strategy,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_display_includes_wait() {
        let error = SearchError::rate_limited(Duration::from_secs(17));
        assert!(error.to_string().contains("17"));
    }

    #[test]
    fn test_backend_display_includes_strategy() {
        let error = SearchError::backend("title", "boom");
        let msg = error.to_string();
        assert!(msg.contains("title"), "expected strategy in: {msg}");
        assert!(msg.contains("boom"), "expected detail in: {msg}");
    }
}
