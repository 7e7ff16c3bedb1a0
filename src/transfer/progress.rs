//! Throttled progress reporting for transfers and uploads.
//!
//! Progress text is pushed to a [`ProgressSink`] (typically an editable
//! transport message) under an anti-spam cadence: a render happens when
//! the integer percentage advanced by at least one point or enough
//! time passed since the last render, with a coarser MB-denominated
//! cadence once a file crosses the large-file threshold. The same text
//! is never rendered twice in a row, and sink failures never fail the
//! transfer.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

use super::constants::LARGE_FILE_BYTES;
use crate::gate::UserId;

const MB: u64 = 1024 * 1024;

/// Cadence for small-file renders.
const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(2);

/// Forced-render interval for large downloads.
const DOWNLOAD_LARGE_INTERVAL: Duration = Duration::from_secs(10);

/// Forced-render interval for large uploads.
const UPLOAD_LARGE_INTERVAL: Duration = Duration::from_secs(15);

/// MB step between large-upload renders.
const UPLOAD_LARGE_MB_STEP: u64 = 5;

/// Errors a progress sink can signal.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The rendered text matched what the sink already shows.
    #[error("content unchanged")]
    NotModified,

    /// Any other failure pushing the update.
    #[error("progress update failed: {0}")]
    Failed(String),
}

/// Destination for rendered progress text.
#[async_trait]
pub trait ProgressSink: Send {
    /// Replaces the currently shown text.
    async fn update(&mut self, text: &str) -> Result<(), SinkError>;
}

/// Last successfully rendered percent and time, per user.
#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    percent: i64,
    updated_at: Instant,
}

/// Process-scoped map of per-user progress state, shared by cheap
/// clone. Entries exist only for the duration of one delivery cycle;
/// the pipeline clears them when the cycle ends.
#[derive(Clone, Default)]
pub struct ProgressLedger {
    entries: Arc<DashMap<UserId, LedgerEntry>>,
}

impl ProgressLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the user's last successful render; `Duration::MAX`
    /// when nothing was rendered yet.
    #[must_use]
    pub fn elapsed(&self, user: UserId) -> Duration {
        self.entries
            .get(&user)
            .map_or(Duration::MAX, |entry| entry.updated_at.elapsed())
    }

    fn touch(&self, user: UserId, percent: i64) {
        self.entries.insert(
            user,
            LedgerEntry {
                percent,
                updated_at: Instant::now(),
            },
        );
    }

    /// Drops the user's entry at the end of a delivery cycle.
    pub fn clear(&self, user: UserId) {
        self.entries.remove(&user);
    }

    /// Number of users with an in-flight cycle.
    #[must_use]
    pub fn active(&self) -> usize {
        self.entries.len()
    }

    /// Last rendered percent for a user, if any. Exposed for tests and
    /// diagnostics.
    #[must_use]
    pub fn last_percent(&self, user: UserId) -> Option<i64> {
        self.entries.get(&user).map(|entry| entry.percent)
    }
}

/// Throttle cadence for one direction of transfer.
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    /// Minimum elapsed time that forces a small-file render.
    pub min_interval: Duration,
    /// Byte threshold for the large-file branch.
    pub large_file_bytes: u64,
    /// Forced-render interval in the large-file branch.
    pub large_interval: Duration,
    /// MB step between large-file renders; `None` keeps the percent
    /// cadence and only forces coarse renders on the interval.
    pub large_mb_step: Option<u64>,
}

impl ThrottlePolicy {
    /// Cadence for downloads: 1 % / 2 s, forced 10 s renders past 30 MB.
    #[must_use]
    pub fn download() -> Self {
        Self {
            min_interval: MIN_UPDATE_INTERVAL,
            large_file_bytes: LARGE_FILE_BYTES,
            large_interval: DOWNLOAD_LARGE_INTERVAL,
            large_mb_step: None,
        }
    }

    /// Cadence for uploads: 1 % / 2 s, 5 MB / 15 s past 30 MB.
    #[must_use]
    pub fn upload() -> Self {
        Self {
            min_interval: MIN_UPDATE_INTERVAL,
            large_file_bytes: LARGE_FILE_BYTES,
            large_interval: UPLOAD_LARGE_INTERVAL,
            large_mb_step: Some(UPLOAD_LARGE_MB_STEP),
        }
    }
}

/// Renders throttled progress text for one transfer direction.
///
/// Owned by a single delivery cycle; the shared [`ProgressLedger`]
/// carries the per-user timestamp across the download and upload
/// phases of the cycle.
pub struct ProgressReporter {
    policy: ThrottlePolicy,
    verb: &'static str,
    user: UserId,
    ledger: ProgressLedger,
    last_percent: i64,
    last_text: String,
}

impl ProgressReporter {
    /// Reporter for the download phase.
    #[must_use]
    pub fn download(user: UserId, ledger: ProgressLedger) -> Self {
        Self::new(ThrottlePolicy::download(), "Downloading", user, ledger)
    }

    /// Reporter for the upload phase.
    #[must_use]
    pub fn upload(user: UserId, ledger: ProgressLedger) -> Self {
        Self::new(ThrottlePolicy::upload(), "Uploading", user, ledger)
    }

    /// Reporter with a custom cadence; used by tests.
    #[must_use]
    pub fn new(
        policy: ThrottlePolicy,
        verb: &'static str,
        user: UserId,
        ledger: ProgressLedger,
    ) -> Self {
        Self {
            policy,
            verb,
            user,
            ledger,
            last_percent: -1,
            last_text: String::new(),
        }
    }

    /// Offers a progress sample to the throttle; renders to the sink
    /// when the cadence allows. Sink failures are swallowed and logged.
    pub async fn report(&mut self, sink: &mut dyn ProgressSink, current: u64, total: u64) {
        if total == 0 {
            return;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let percent = ((current as f64) * 100.0 / (total as f64)).round() as i64;
        let elapsed = self.ledger.elapsed(self.user);
        let large = total > self.policy.large_file_bytes;

        if large {
            if let Some(step) = self.policy.large_mb_step {
                // Large uploads render on MB steps or the long interval.
                let text = format!("{} {}MB ({}MB sent)...", self.verb, total / MB, current / MB);
                #[allow(clippy::cast_sign_loss)]
                let last_mb = self.last_percent.max(0) as u64 * total / 100 / MB;
                if ((current / MB).saturating_sub(last_mb) >= step
                    || elapsed > self.policy.large_interval)
                    && text != self.last_text
                {
                    self.push(sink, percent, text).await;
                }
                return;
            }
        }

        let text = format!("{}... ({percent}%)", self.verb);
        if (percent - self.last_percent >= 1 || elapsed > self.policy.min_interval)
            && text != self.last_text
        {
            self.push(sink, percent, text).await;
            return;
        }

        if large && elapsed > self.policy.large_interval {
            // Stalled percent on a large download: force a coarse MB
            // render so the user still sees movement.
            let coarse = format!(
                "{} large file... ({}MB/{}MB)",
                self.verb,
                current / MB,
                total / MB
            );
            if coarse != self.last_text {
                self.push(sink, percent, coarse).await;
            }
        }
    }

    /// Pushes one final, cadence-exempt message (terminal states).
    pub async fn force(&mut self, sink: &mut dyn ProgressSink, text: String) {
        if text != self.last_text {
            let percent = self.last_percent;
            self.push(sink, percent, text).await;
        }
    }

    async fn push(&mut self, sink: &mut dyn ProgressSink, percent: i64, text: String) {
        match sink.update(&text).await {
            Ok(()) => {
                self.last_percent = percent;
                self.last_text = text;
                self.ledger.touch(self.user, percent);
            }
            Err(SinkError::NotModified) => {}
            Err(error) => warn!(error = %error, "progress update failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Sink that records every accepted text.
    #[derive(Default)]
    struct CollectingSink {
        texts: Vec<String>,
    }

    #[async_trait]
    impl ProgressSink for CollectingSink {
        async fn update(&mut self, text: &str) -> Result<(), SinkError> {
            self.texts.push(text.to_string());
            Ok(())
        }
    }

    /// Sink that always reports the content as unchanged.
    struct UnmodifiedSink;

    #[async_trait]
    impl ProgressSink for UnmodifiedSink {
        async fn update(&mut self, _text: &str) -> Result<(), SinkError> {
            Err(SinkError::NotModified)
        }
    }

    const SMALL_TOTAL: u64 = 10 * MB;
    const LARGE_TOTAL: u64 = 60 * MB;

    #[tokio::test(start_paused = true)]
    async fn test_first_sample_renders_immediately() {
        let mut sink = CollectingSink::default();
        let mut reporter = ProgressReporter::download(1, ProgressLedger::new());

        reporter.report(&mut sink, 0, SMALL_TOTAL).await;
        assert_eq!(sink.texts, vec!["Downloading... (0%)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_consecutive_identical_texts() {
        let mut sink = CollectingSink::default();
        let ledger = ProgressLedger::new();
        let mut reporter = ProgressReporter::download(1, ledger);

        reporter.report(&mut sink, MB, SMALL_TOTAL).await;
        // Same percent again after the interval elapses: cadence allows
        // a render but the identical text is suppressed.
        tokio::time::advance(Duration::from_secs(3)).await;
        reporter.report(&mut sink, MB, SMALL_TOTAL).await;

        assert_eq!(sink.texts.len(), 1);
        for pair in sink.texts.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_percent_progress_is_throttled() {
        let mut sink = CollectingSink::default();
        let mut reporter = ProgressReporter::download(1, ProgressLedger::new());

        reporter.report(&mut sink, MB, SMALL_TOTAL).await;
        // 10.4% rounds back to 10%; no time elapsed, so nothing renders.
        reporter.report(&mut sink, MB + 40 * 1024, SMALL_TOTAL).await;

        assert_eq!(sink.texts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_download_forces_coarse_render() {
        let mut sink = CollectingSink::default();
        let mut reporter = ProgressReporter::download(1, ProgressLedger::new());

        reporter.report(&mut sink, 31 * MB, LARGE_TOTAL).await;
        // Stalled: same byte count, long wait. The 2s interval fires
        // first but the identical percent text is suppressed; at >10s a
        // coarse MB render goes out.
        tokio::time::advance(Duration::from_secs(11)).await;
        reporter.report(&mut sink, 31 * MB + 1, LARGE_TOTAL).await;

        assert_eq!(sink.texts.len(), 2);
        assert_eq!(sink.texts[1], "Downloading large file... (31MB/60MB)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_upload_renders_on_mb_step() {
        let mut sink = CollectingSink::default();
        let mut reporter = ProgressReporter::upload(1, ProgressLedger::new());

        reporter.report(&mut sink, 0, LARGE_TOTAL).await;
        // 3MB advanced: below the 5MB step and inside the interval.
        reporter.report(&mut sink, 3 * MB, LARGE_TOTAL).await;
        // 6MB advanced: crosses the step.
        reporter.report(&mut sink, 6 * MB, LARGE_TOTAL).await;

        assert_eq!(
            sink.texts,
            vec![
                "Uploading 60MB (0MB sent)...",
                "Uploading 60MB (6MB sent)...",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_not_modified_is_swallowed() {
        let mut sink = UnmodifiedSink;
        let ledger = ProgressLedger::new();
        let mut reporter = ProgressReporter::download(9, ledger.clone());

        reporter.report(&mut sink, MB, SMALL_TOTAL).await;
        // Failed push leaves no ledger entry behind.
        assert_eq!(ledger.last_percent(9), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_cleared_between_cycles() {
        let ledger = ProgressLedger::new();
        let mut sink = CollectingSink::default();
        let mut reporter = ProgressReporter::download(5, ledger.clone());

        reporter.report(&mut sink, MB, SMALL_TOTAL).await;
        assert_eq!(ledger.active(), 1);
        ledger.clear(5);
        assert_eq!(ledger.active(), 0);
        assert_eq!(ledger.elapsed(5), Duration::MAX);
    }
}
