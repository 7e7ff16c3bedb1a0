//! Bookrelay core library.
//!
//! Bookrelay bridges a searchable book catalog and a messaging
//! transport: free-text queries are searched across layered strategies,
//! results are cached and paginated behind opaque session keys, and a
//! selected result is downloaded and relayed to the requesting client
//! with throttled progress feedback, size gating, bounded retries, and
//! a post-delivery lifecycle (auto-delete plus deduplicated archival).
//!
//! # Architecture
//!
//! - [`search`] - strategy-layered catalog search with validation and dedup
//! - [`session`] - cached result sets, pagination, keyboards, callbacks
//! - [`gate`] - per-user serialization of delivery cycles
//! - [`transfer`] - streaming download engine with progress throttling
//! - [`delivery`] - transport seam, upload engine, post-delivery lifecycle
//! - [`store`] - title existence store backing archival dedup
//! - [`pipeline`] - the assembled search → select → deliver flow

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod delivery;
pub mod gate;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod store;
pub mod transfer;

// Re-export commonly used types
pub use config::Settings;
pub use delivery::{ChatId, DeliveryEngine, MessageHandle, Transport, TransportError};
pub use gate::{UserGate, UserId};
pub use pipeline::{Pipeline, RequestCtx};
pub use search::{CatalogBackend, CatalogRecord, SearchOrchestrator};
pub use session::{RESULTS_PER_PAGE, SessionError, SessionStore};
pub use store::{MemoryTitleStore, SqliteTitleStore, StoreError, TitleStore};
pub use transfer::{TransferEngine, TransferError, TransferLimits};
