//! Post-delivery lifecycle: auto-delete and deduplicated archival.
//!
//! Everything here is best-effort. Archival and auto-delete failures
//! are logged with context and never surface to the delivery path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{ChatId, MessageHandle, Transport};
use crate::gate::UserId;
use crate::search::CatalogRecord;
use crate::store::TitleStore;

/// Titles carrying this literal placeholder are never archived.
const UNKNOWN_TITLE: &str = "unknown";

/// Destinations and timing for the post-delivery lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Chat receiving a copy of every delivery, with metadata caption.
    pub log_channel: ChatId,
    /// Archival-store channels; forwards go to the first entry. Empty
    /// disables archival.
    pub archive_channels: Vec<ChatId>,
    /// Delay before a delivered message is deleted; zero disables.
    pub auto_delete_delay: Duration,
}

/// Normalizes a raw title for dedup: lowercased and trimmed. Returns
/// `None` for empty or placeholder titles, which are never archived.
#[must_use]
pub fn normalize_title(raw: &str) -> Option<String> {
    let clean = raw.trim().to_lowercase();
    if clean.is_empty() || clean == UNKNOWN_TITLE {
        return None;
    }
    Some(clean)
}

/// Schedules auto-deletion of a delivered message.
///
/// With a zero delay nothing is scheduled and no notice is sent.
/// Otherwise a "will be deleted" notice goes out immediately and a
/// fire-and-forget task deletes the delivered message after the delay,
/// then edits the notice to its deleted state. Once scheduled the task
/// cannot be cancelled; failures are logged only.
///
/// Returns the spawned task handle so tests can await the firing.
#[instrument(skip(transport, delivered), fields(chat))]
pub async fn schedule_auto_delete(
    transport: Arc<dyn Transport>,
    chat: ChatId,
    delivered: MessageHandle,
    delay: Duration,
) -> Option<JoinHandle<()>> {
    if delay.is_zero() {
        return None;
    }

    let notice_text = format!(
        "This file will be deleted in {} minutes. Save it elsewhere.",
        delay.as_secs().div_ceil(60)
    );
    let notice = match transport.reply(chat, &notice_text, None).await {
        Ok(handle) => handle,
        Err(error) => {
            warn!(error = %error, "failed to send auto-delete notice");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(error) = transport.delete(&delivered).await {
            error!(error = %error, "auto-delete failed");
            return;
        }
        if let Err(error) = transport
            .edit(&notice, "The delivered file was deleted.", None)
            .await
        {
            error!(error = %error, "failed to edit auto-delete notice");
        }
        debug!(message_id = delivered.message_id, "auto-delete fired");
    }))
}

/// Archives a delivered artifact: mirrors it to the log channel, then
/// forwards the first copy of each distinct normalized title to the
/// archival-store channel and records the title.
///
/// Every step is best-effort; failures are logged with full context
/// and never fail the delivery.
#[instrument(skip(transport, store, local_path, record), fields(title = %record.title, user))]
pub async fn archive_delivery(
    transport: &dyn Transport,
    store: &dyn TitleStore,
    config: &LifecycleConfig,
    local_path: &Path,
    record: &CatalogRecord,
    user: UserId,
) {
    // Mirror every delivery to the log channel first.
    let caption = format!(
        "User {user} downloaded:\nTitle: {}\nAuthor: {}\nSize: {}",
        record.title, record.author, record.size
    );
    let (drop_tx, _drop_rx) = mpsc::unbounded_channel();
    if let Err(log_error) = transport
        .send_document(config.log_channel, local_path, &caption, drop_tx)
        .await
    {
        error!(error = %log_error, "failed to mirror delivery to log channel");
    }

    let Some(clean_title) = normalize_title(&record.title) else {
        warn!("skipping archival for empty or placeholder title");
        return;
    };

    let Some(&archive_channel) = config.archive_channels.first() else {
        debug!("no archival-store channel configured");
        return;
    };

    match store.exists(&clean_title).await {
        Ok(true) => {
            debug!(title = %clean_title, "duplicate title; archival skipped");
        }
        Ok(false) => {
            info!(title = %clean_title, "new title detected; archiving");
            let (tx, _rx) = mpsc::unbounded_channel();
            if let Err(send_error) = transport
                .send_document(archive_channel, local_path, "", tx)
                .await
            {
                error!(error = %send_error, "failed to forward artifact to archival store");
                return;
            }
            if let Err(store_error) = store.insert(&clean_title).await {
                error!(error = %store_error, "failed to record archived title");
            }
        }
        Err(error) => {
            error!(error = %error, "title existence check failed; archival skipped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Dune  "), Some("dune".to_string()));
        assert_eq!(normalize_title("DUNE"), Some("dune".to_string()));
        assert_eq!(normalize_title("   "), None);
        assert_eq!(normalize_title("Unknown"), None);
        assert_eq!(normalize_title("unknown"), None);
    }
}
