//! Upload engine: whole-upload retry on transport rate limits.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::{ChatId, MessageHandle, Transport, TransportError};
use crate::search::CatalogRecord;
use crate::transfer::{ProgressReporter, ProgressSink};

/// Default bound on whole-upload retries after rate limits.
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 5;

/// Uploads delivered files to the requesting chat with progress
/// feedback.
///
/// A rate-limit signal retries the entire upload after sleeping the
/// signaled duration, inside a bounded loop rather than open-ended
/// recursion.
pub struct DeliveryEngine {
    rate_limit_retries: u32,
}

impl DeliveryEngine {
    /// Creates an engine with the given retry bound.
    #[must_use]
    pub fn new(rate_limit_retries: u32) -> Self {
        Self { rate_limit_retries }
    }

    /// Uploads `path` to `chat` with a caption derived from the record,
    /// driving the upload-cadence reporter from the transport's byte
    /// samples.
    ///
    /// # Errors
    ///
    /// Returns the transport's error once rate-limit retries are
    /// exhausted or on any non-rate-limit failure.
    #[instrument(skip(self, transport, sink, reporter), fields(path = %path.display(), chat))]
    pub async fn deliver(
        &self,
        transport: &dyn Transport,
        chat: ChatId,
        path: &Path,
        record: &CatalogRecord,
        sink: &mut dyn ProgressSink,
        reporter: &mut ProgressReporter,
    ) -> Result<MessageHandle, TransportError> {
        let caption = caption_for(record);
        let mut retries = 0u32;

        loop {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let send = transport.send_document(chat, path, &caption, tx);

            // The transport owns the sender; the progress loop drains
            // samples until the upload future drops it.
            let progress = async {
                while let Some((current, total)) = rx.recv().await {
                    reporter.report(sink, current, total).await;
                }
            };

            let (outcome, ()) = tokio::join!(send, progress);

            match outcome {
                Ok(handle) => {
                    info!(message_id = handle.message_id, "document delivered");
                    return Ok(handle);
                }
                Err(TransportError::RateLimited { wait }) if retries < self.rate_limit_retries => {
                    retries += 1;
                    warn!(
                        retries,
                        max_retries = self.rate_limit_retries,
                        wait_secs = wait.as_secs(),
                        "upload rate limited; retrying whole upload after wait"
                    );
                    reporter
                        .force(
                            sink,
                            format!("Rate limited: waiting {}s before retrying", wait.as_secs()),
                        )
                        .await;
                    tokio::time::sleep(wait).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for DeliveryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_RETRIES)
    }
}

/// Builds the delivered-document caption from record metadata.
#[must_use]
pub fn caption_for(record: &CatalogRecord) -> String {
    format!(
        "{}\nAuthor: {}\nSize: {}",
        record.title, record.author, record.size
    )
}
