//! Delivery to the requesting client: transport seam, upload engine,
//! and post-delivery lifecycle.
//!
//! The messaging transport is an external collaborator; this module
//! pins down its interface ([`Transport`]) and builds the upload retry
//! loop, auto-delete scheduling, and deduplicated archival on top of
//! it.

mod lifecycle;
mod upload;

pub use lifecycle::{LifecycleConfig, archive_delivery, normalize_title, schedule_auto_delete};
pub use upload::DeliveryEngine;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::session::Keyboard;
use crate::transfer::{ProgressSink, SinkError};

/// Identifier of a chat the transport can address.
pub type ChatId = i64;

/// Handle to one message the transport produced; used for later edit
/// and delete calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Chat the message lives in.
    pub chat_id: ChatId,
    /// Transport-assigned message id.
    pub message_id: i64,
}

/// Errors the messaging transport can signal.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport asked the caller to wait before retrying.
    #[error("transport rate limited: retry after {}s", wait.as_secs())]
    RateLimited {
        /// How long the transport asked us to wait.
        wait: Duration,
    },

    /// An edit whose content matches what is already shown.
    #[error("message not modified")]
    NotModified,

    /// Any other send/edit/delete failure.
    #[error("transport error: {0}")]
    Send(String),
}

impl TransportError {
    /// Creates a rate-limited error with the signaled wait.
    #[must_use]
    pub fn rate_limited(wait: Duration) -> Self {
        Self::RateLimited { wait }
    }

    /// Creates a generic send failure.
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }
}

/// Byte-progress samples emitted by a transport during an upload.
pub type UploadProgress = UnboundedSender<(u64, u64)>;

/// Messaging/delivery transport: a send/edit/delete API over messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a new message, optionally with a keyboard.
    async fn reply(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageHandle, TransportError>;

    /// Edits an existing message in place.
    async fn edit(
        &self,
        message: &MessageHandle,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError>;

    /// Deletes a message.
    async fn delete(&self, message: &MessageHandle) -> Result<(), TransportError>;

    /// Uploads a local file as a document with a caption, reporting
    /// `(bytes_sent, bytes_total)` samples through `progress`.
    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        caption: &str,
        progress: UploadProgress,
    ) -> Result<MessageHandle, TransportError>;

    /// Shows a short-lived notice to the requesting user.
    async fn ack(&self, text: &str) -> Result<(), TransportError>;
}

/// Progress sink that renders into an editable transport message.
pub struct MessageSink<'a> {
    transport: &'a dyn Transport,
    message: MessageHandle,
}

impl<'a> MessageSink<'a> {
    /// Creates a sink that edits the given message.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, message: MessageHandle) -> Self {
        Self { transport, message }
    }
}

#[async_trait]
impl ProgressSink for MessageSink<'_> {
    async fn update(&mut self, text: &str) -> Result<(), SinkError> {
        match self.transport.edit(&self.message, text, None).await {
            Ok(()) => Ok(()),
            Err(TransportError::NotModified) => Err(SinkError::NotModified),
            Err(error) => Err(SinkError::Failed(error.to_string())),
        }
    }
}
