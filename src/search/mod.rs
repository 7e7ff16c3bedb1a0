//! Catalog search orchestration.
//!
//! The orchestrator runs an ordered list of named search strategies
//! against a [`CatalogBackend`], tolerating individual strategy
//! failures, validating the records each strategy returns, and
//! deduplicating the combined output by record id. A rate-limit signal
//! from any strategy aborts the pass; after the signaled cooldown a
//! single fallback strategy runs instead.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bookrelay::search::{HttpCatalogBackend, SearchOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = HttpCatalogBackend::new("https://catalog.example.com")?;
//! let orchestrator = SearchOrchestrator::new(Arc::new(backend));
//! let records = orchestrator.search("the great gatsby").await;
//! println!("found {} records", records.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod http;

pub use error::SearchError;
pub use http::HttpCatalogBackend;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Safety margin added to a backend-signaled cooldown before the
/// fallback strategy runs.
pub const RATE_LIMIT_MARGIN: Duration = Duration::from_secs(2);

/// One searchable book entry with metadata and a direct download URL.
///
/// Immutable once produced by a search pass. The `id` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Backend-assigned unique identifier, used for dedup.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author name(s) as reported by the catalog.
    pub author: String,
    /// Human-readable size string (e.g. "4 Mb").
    pub size: String,
    /// File extension without the dot (e.g. "pdf", "epub").
    pub extension: String,
    /// Direct download URL for the file.
    pub mirror_url: String,
}

/// A record as decoded from the backend, before validation.
///
/// Every field is optional; [`validate_record`] decides which entries
/// are complete enough to surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    /// Backend identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Book title.
    #[serde(default)]
    pub title: Option<String>,
    /// Author name(s).
    #[serde(default)]
    pub author: Option<String>,
    /// Display size string.
    #[serde(default)]
    pub size: Option<String>,
    /// File extension.
    #[serde(default)]
    pub extension: Option<String>,
    /// Direct download URL.
    #[serde(default)]
    pub mirror_url: Option<String>,
}

/// Named search strategies, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Broad default search across all fields.
    Default,
    /// Title search with exact matching.
    TitleExact,
    /// Default search with relaxed filtering.
    DefaultFiltered,
    /// Plain title search; used as the post-cooldown fallback.
    Title,
}

impl SearchStrategy {
    /// Strategies run on a normal search pass, in order.
    pub const PRIMARY: [SearchStrategy; 3] =
        [Self::Default, Self::TitleExact, Self::DefaultFiltered];

    /// Strategy run once after a rate-limit cooldown.
    pub const FALLBACK: SearchStrategy = Self::Title;

    /// Stable name used in logs and backend requests.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::TitleExact => "title_exact",
            Self::DefaultFiltered => "default_filtered",
            Self::Title => "title",
        }
    }
}

/// External catalog search backend, one strategy per call.
///
/// Implementations map a strategy onto whatever query surface the
/// backend exposes. A rate-limit response must be surfaced as
/// [`SearchError::RateLimited`] so the orchestrator can cool down.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Runs one named strategy and returns the raw candidate records.
    async fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
    ) -> Result<Vec<RawRecord>, SearchError>;
}

/// Validates a raw record, returning the complete form if it carries
/// all required fields (id, author, title, and a parseable absolute
/// download link).
#[must_use]
pub fn validate_record(raw: &RawRecord) -> Option<CatalogRecord> {
    let id = raw.id.as_deref().filter(|s| !s.is_empty())?;
    let title = raw.title.as_deref().filter(|s| !s.is_empty())?;
    let author = raw.author.as_deref().filter(|s| !s.is_empty())?;
    let mirror_url = raw.mirror_url.as_deref().filter(|s| !s.is_empty())?;
    Url::parse(mirror_url).ok()?;

    Some(CatalogRecord {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        size: raw.size.clone().unwrap_or_else(|| "N/A".to_string()),
        extension: raw.extension.clone().unwrap_or_else(|| "pdf".to_string()),
        mirror_url: mirror_url.to_string(),
    })
}

/// Runs layered search strategies against a backend and merges the
/// results.
///
/// `search` never fails: strategy errors are logged and skipped, and a
/// rate-limit signal degrades to a single fallback strategy after the
/// signaled cooldown. The worst case is an empty result set.
pub struct SearchOrchestrator {
    backend: Arc<dyn CatalogBackend>,
}

impl SearchOrchestrator {
    /// Creates an orchestrator over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CatalogBackend>) -> Self {
        Self { backend }
    }

    /// Searches the catalog, returning validated, deduplicated records
    /// in first-seen order. Always returns; never errors.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Vec<CatalogRecord> {
        match self.run_primary(query).await {
            Ok(records) => records,
            Err(wait) => {
                let cooldown = wait + RATE_LIMIT_MARGIN;
                info!(
                    cooldown_secs = cooldown.as_secs(),
                    "catalog rate limited; cooling down before fallback search"
                );
                tokio::time::sleep(cooldown).await;
                self.run_fallback(query).await
            }
        }
    }

    /// Runs the primary strategies; `Err` carries the backend-signaled
    /// rate-limit wait that aborted the pass.
    async fn run_primary(&self, query: &str) -> Result<Vec<CatalogRecord>, Duration> {
        let mut merged = Vec::new();

        for strategy in SearchStrategy::PRIMARY {
            match self.backend.search(query, strategy).await {
                Ok(raw) => {
                    let before = merged.len();
                    collect_valid(strategy, raw, &mut merged);
                    debug!(
                        strategy = strategy.name(),
                        accepted = merged.len() - before,
                        "strategy completed"
                    );
                }
                Err(SearchError::RateLimited { wait }) => return Err(wait),
                Err(error) => {
                    warn!(
                        strategy = strategy.name(),
                        error = %error,
                        "search strategy failed; continuing with remaining strategies"
                    );
                }
            }
        }

        Ok(dedup_by_id(merged))
    }

    /// Runs the single fallback strategy; errors yield an empty set.
    async fn run_fallback(&self, query: &str) -> Vec<CatalogRecord> {
        match self.backend.search(query, SearchStrategy::FALLBACK).await {
            Ok(raw) => {
                let mut records = Vec::new();
                collect_valid(SearchStrategy::FALLBACK, raw, &mut records);
                dedup_by_id(records)
            }
            Err(error) => {
                warn!(error = %error, "fallback search failed");
                Vec::new()
            }
        }
    }
}

/// Validates each raw record, pushing accepted ones and warning on the
/// rest.
fn collect_valid(strategy: SearchStrategy, raw: Vec<RawRecord>, out: &mut Vec<CatalogRecord>) {
    for record in raw {
        match validate_record(&record) {
            Some(valid) => out.push(valid),
            None => warn!(
                strategy = strategy.name(),
                ?record,
                "dropping malformed catalog record"
            ),
        }
    }
}

/// Removes duplicate ids, keeping the first occurrence (stable order).
fn dedup_by_id(records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(id: &str, title: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            author: Some("Author".to_string()),
            size: Some("1 Mb".to_string()),
            extension: Some("pdf".to_string()),
            mirror_url: Some(format!("https://mirror.example/{id}")),
        }
    }

    /// Backend whose per-strategy outcomes are scripted up front.
    struct ScriptedBackend {
        outcomes: dashmap::DashMap<&'static str, Result<Vec<RawRecord>, SearchError>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                outcomes: dashmap::DashMap::new(),
            }
        }

        fn set(&self, strategy: SearchStrategy, outcome: Result<Vec<RawRecord>, SearchError>) {
            self.outcomes.insert(strategy.name(), outcome);
        }
    }

    #[async_trait]
    impl CatalogBackend for ScriptedBackend {
        async fn search(
            &self,
            _query: &str,
            strategy: SearchStrategy,
        ) -> Result<Vec<RawRecord>, SearchError> {
            match self.outcomes.remove(strategy.name()) {
                Some((_, outcome)) => outcome,
                None => Ok(Vec::new()),
            }
        }
    }

    #[test]
    fn test_validate_record_requires_all_fields() {
        let mut record = raw("1", "Book");
        assert!(validate_record(&record).is_some());

        record.mirror_url = None;
        assert!(validate_record(&record).is_none());

        let mut record = raw("1", "Book");
        record.author = Some(String::new());
        assert!(validate_record(&record).is_none());

        let mut record = raw("1", "Book");
        record.mirror_url = Some("not a url".to_string());
        assert!(validate_record(&record).is_none());

        let record = RawRecord::default();
        assert!(validate_record(&record).is_none());
    }

    #[test]
    fn test_validate_record_defaults_optional_fields() {
        let mut record = raw("1", "Book");
        record.size = None;
        record.extension = None;
        let valid = validate_record(&record).unwrap();
        assert_eq!(valid.size, "N/A");
        assert_eq!(valid.extension, "pdf");
    }

    #[tokio::test]
    async fn test_search_dedups_by_id_first_seen_order() {
        let backend = ScriptedBackend::new();
        backend.set(
            SearchStrategy::Default,
            Ok(vec![raw("a", "First"), raw("b", "Second")]),
        );
        backend.set(
            SearchStrategy::TitleExact,
            Ok(vec![raw("b", "Second again"), raw("c", "Third")]),
        );

        let orchestrator = SearchOrchestrator::new(Arc::new(backend));
        let records = orchestrator.search("query").await;

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        // First occurrence wins.
        assert_eq!(records[1].title, "Second");
    }

    #[tokio::test]
    async fn test_search_skips_failing_strategy() {
        let backend = ScriptedBackend::new();
        backend.set(
            SearchStrategy::Default,
            Err(SearchError::backend("default", "strategy exploded")),
        );
        backend.set(SearchStrategy::TitleExact, Ok(vec![raw("x", "Survivor")]));

        let orchestrator = SearchOrchestrator::new(Arc::new(backend));
        let records = orchestrator.search("query").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "x");
    }

    #[tokio::test]
    async fn test_search_drops_malformed_records() {
        let backend = ScriptedBackend::new();
        let mut bad = raw("bad", "No link");
        bad.mirror_url = None;
        backend.set(SearchStrategy::Default, Ok(vec![bad, raw("ok", "Good")]));

        let orchestrator = SearchOrchestrator::new(Arc::new(backend));
        let records = orchestrator.search("query").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_aborts_pass_and_runs_fallback() {
        let backend = ScriptedBackend::new();
        backend.set(
            SearchStrategy::Default,
            Err(SearchError::rate_limited(Duration::from_secs(3))),
        );
        // Would have returned results, but the pass is aborted.
        backend.set(SearchStrategy::TitleExact, Ok(vec![raw("skipped", "Nope")]));
        backend.set(SearchStrategy::Title, Ok(vec![raw("fb", "Fallback hit")]));

        let orchestrator = SearchOrchestrator::new(Arc::new(backend));
        let records = orchestrator.search("query").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "fb");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_error_yields_empty() {
        let backend = ScriptedBackend::new();
        backend.set(
            SearchStrategy::Default,
            Err(SearchError::rate_limited(Duration::from_secs(1))),
        );
        backend.set(
            SearchStrategy::Title,
            Err(SearchError::backend("title", "still down")),
        );

        let orchestrator = SearchOrchestrator::new(Arc::new(backend));
        let records = orchestrator.search("query").await;

        assert!(records.is_empty());
    }
}
