//! File transfer: streaming downloads with throttled progress.
//!
//! # Features
//!
//! - Streaming downloads buffered to a fixed write granularity
//! - Hard size cap with a direct-link fallback message
//! - Per-chunk write retries and whole-attempt transport retries
//! - Anti-spam progress cadence shared with the upload path
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use bookrelay::transfer::{ProgressLedger, ProgressReporter, TransferEngine, TransferLimits};
//! # use bookrelay::transfer::{ProgressSink, SinkError};
//! # struct NullSink;
//! # #[async_trait::async_trait]
//! # impl ProgressSink for NullSink {
//! #     async fn update(&mut self, _text: &str) -> Result<(), SinkError> { Ok(()) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TransferEngine::new(TransferLimits::default())?;
//! let ledger = ProgressLedger::new();
//! let mut reporter = ProgressReporter::download(42, ledger);
//! let mut sink = NullSink;
//! engine
//!     .fetch("https://mirror.example/book.epub", Path::new("downloads/book.epub"), &mut sink, &mut reporter)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod engine;
mod error;
mod progress;

pub use engine::{TransferEngine, TransferLimits};
pub use error::TransferError;
pub use progress::{ProgressLedger, ProgressReporter, ProgressSink, SinkError, ThrottlePolicy};
