//! Cached search sessions and pagination.
//!
//! A [`SessionStore`] maps opaque keys to cached result sets so that
//! pagination and selection callbacks can operate without re-running
//! the search. Entries are created on search completion and removed by
//! the TTL sweep in [`SessionStore::evict_expired`].

mod callback;
mod render;

pub use callback::{CallbackAction, parse_callback};
pub use render::{Button, Keyboard, result_keyboard};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::search::CatalogRecord;

/// Fixed number of results per rendered page.
pub const RESULTS_PER_PAGE: usize = 10;

/// Default time-to-live for a cached session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// User-facing session and selection errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session key is unknown or has been evicted.
    #[error("search session expired")]
    Expired,

    /// The requested page is outside `[1, total_pages]`.
    #[error("invalid page {page} (valid range 1..={total_pages})")]
    InvalidPage {
        /// The requested page number.
        page: usize,
        /// Number of pages the session actually has.
        total_pages: usize,
    },

    /// The selected result index does not exist in the session.
    #[error("invalid selection {index}")]
    InvalidSelection {
        /// The requested result index.
        index: usize,
    },
}

/// One cached search result set with its query metadata.
#[derive(Debug, Clone)]
pub struct SearchSession {
    /// Records in relevance order, as returned by the orchestrator.
    pub records: Vec<CatalogRecord>,
    /// The original free-text query.
    pub query: String,
    created_at: Instant,
}

/// One page sliced out of a session, plus the context needed to render
/// navigation controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    /// Records on this page, relevance order preserved.
    pub records: Vec<CatalogRecord>,
    /// 1-indexed page number.
    pub page: usize,
    /// Total number of pages in the session.
    pub total_pages: usize,
    /// Total number of records in the session.
    pub total: usize,
    /// Global index of the first record on this page.
    pub start_index: usize,
    /// The original query, for header text.
    pub query: String,
}

/// Process-scoped cache of search sessions, shared by cheap clone.
///
/// Keys are opaque uuid tokens; distinct keys never contend. Entries
/// are created on demand and pruned by [`SessionStore::evict_expired`].
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SearchSession>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a store with the given session TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Caches a result set and returns its fresh opaque key.
    #[must_use]
    pub fn create(&self, query: impl Into<String>, records: Vec<CatalogRecord>) -> String {
        let key = Uuid::new_v4().to_string();
        self.sessions.insert(
            key.clone(),
            SearchSession {
                records,
                query: query.into(),
                created_at: Instant::now(),
            },
        );
        key
    }

    /// Returns one page of a session.
    ///
    /// # Errors
    ///
    /// [`SessionError::Expired`] for an unknown key,
    /// [`SessionError::InvalidPage`] for a page outside `[1, total_pages]`.
    pub fn page(&self, key: &str, page: usize) -> Result<PageView, SessionError> {
        let session = self.sessions.get(key).ok_or(SessionError::Expired)?;
        let total = session.records.len();
        let total_pages = total.div_ceil(RESULTS_PER_PAGE);

        if page < 1 || page > total_pages {
            return Err(SessionError::InvalidPage { page, total_pages });
        }

        let start_index = (page - 1) * RESULTS_PER_PAGE;
        let end = (start_index + RESULTS_PER_PAGE).min(total);

        Ok(PageView {
            records: session.records[start_index..end].to_vec(),
            page,
            total_pages,
            total,
            start_index,
            query: session.query.clone(),
        })
    }

    /// Returns the record at a global index, cloned out of the session
    /// so the caller owns it for the duration of the delivery cycle.
    ///
    /// # Errors
    ///
    /// [`SessionError::Expired`] for an unknown key,
    /// [`SessionError::InvalidSelection`] for an out-of-range index.
    pub fn select(&self, key: &str, index: usize) -> Result<CatalogRecord, SessionError> {
        let session = self.sessions.get(key).ok_or(SessionError::Expired)?;
        session
            .records
            .get(index)
            .cloned()
            .ok_or(SessionError::InvalidSelection { index })
    }

    /// Removes sessions older than the configured TTL; returns how many
    /// were evicted.
    pub fn evict_expired(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions
            .retain(|_, session| session.created_at.elapsed() <= ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired search sessions");
        }
        evicted
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no sessions are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
