//! Plain-value runtime settings for the delivery pipeline.

use std::time::Duration;

use crate::delivery::{ChatId, LifecycleConfig};
use crate::session::DEFAULT_SESSION_TTL;
use crate::transfer::TransferLimits;

/// Default bound on whole-upload rate-limit retries.
pub const DEFAULT_UPLOAD_RATE_LIMIT_RETRIES: u32 = 5;

/// Settings injected into the pipeline as plain values.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Transfer limits (size cap, chunking, retry timing).
    pub transfer: TransferLimits,
    /// Bound on whole-upload retries after transport rate limits.
    pub upload_rate_limit_retries: u32,
    /// Chat receiving a copy of every delivery.
    pub log_channel: ChatId,
    /// Archival-store channels; the first entry receives the first copy
    /// of each distinct title. Empty disables archival.
    pub archive_channels: Vec<ChatId>,
    /// Delay before a delivered message is deleted; zero disables.
    pub auto_delete_delay: Duration,
    /// TTL for cached search sessions.
    pub session_ttl: Duration,
}

impl Settings {
    /// The lifecycle slice of the settings.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            log_channel: self.log_channel,
            archive_channels: self.archive_channels.clone(),
            auto_delete_delay: self.auto_delete_delay,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transfer: TransferLimits::default(),
            upload_rate_limit_retries: DEFAULT_UPLOAD_RATE_LIMIT_RETRIES,
            log_channel: 0,
            archive_channels: Vec::new(),
            auto_delete_delay: Duration::ZERO,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}
