//! HTTP JSON catalog backend.
//!
//! The [`HttpCatalogBackend`] queries a catalog endpoint exposing
//! `GET {base}/search?q={query}&mode={strategy}` returning a JSON array
//! of candidate records. A `429` response with a `Retry-After` header
//! (integer seconds) is surfaced as [`SearchError::RateLimited`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{CatalogBackend, RawRecord, SearchError, SearchStrategy};

/// Connect timeout for catalog requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Overall timeout for one catalog request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fallback cooldown when a 429 carries no usable Retry-After header.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// Catalog backend over a JSON search endpoint.
pub struct HttpCatalogBackend {
    client: Client,
    base_url: String,
}

impl HttpCatalogBackend {
    /// Creates a backend for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if HTTP client construction fails.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SearchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SearchError::http("default", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CatalogBackend for HttpCatalogBackend {
    async fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
    ) -> Result<Vec<RawRecord>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("mode", strategy.name())])
            .send()
            .await
            .map_err(|e| SearchError::http(strategy.name(), e))?;

        if response.status().as_u16() == 429 {
            let wait = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(DEFAULT_RATE_LIMIT_WAIT, Duration::from_secs);
            return Err(SearchError::rate_limited(wait));
        }

        if !response.status().is_success() {
            return Err(SearchError::backend(
                strategy.name(),
                format!("catalog returned HTTP {}", response.status().as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::http(strategy.name(), e))?;

        serde_json::from_str(&body).map_err(|e| SearchError::decode(strategy.name(), e))
    }
}
