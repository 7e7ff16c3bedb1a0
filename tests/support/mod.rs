//! Shared helpers for integration tests: a recording transport, a
//! fixed-output catalog backend, and record builders.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use bookrelay::delivery::UploadProgress;
use bookrelay::search::{CatalogBackend, RawRecord, SearchError, SearchStrategy};
use bookrelay::session::Keyboard;
use bookrelay::{ChatId, MessageHandle, Transport, TransportError};

/// Everything a [`RecordingTransport`] observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Reply {
        chat: ChatId,
        message_id: i64,
        text: String,
        has_keyboard: bool,
    },
    Edit {
        message_id: i64,
        text: String,
        has_keyboard: bool,
    },
    Delete {
        message_id: i64,
    },
    Document {
        chat: ChatId,
        message_id: i64,
        file_name: String,
        caption: String,
        bytes: u64,
    },
    Ack {
        text: String,
    },
}

/// Transport that records every call for later assertions.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<Event>>,
    next_id: AtomicI64,
    last_keyboard: Mutex<Option<Keyboard>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn documents_to(&self, chat: ChatId) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Document { chat: c, .. } if *c == chat))
            .collect()
    }

    pub fn acks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Ack { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(i64, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Edit {
                    message_id, text, ..
                } => Some((message_id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<i64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Delete { message_id } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<(i64, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Reply {
                    message_id, text, ..
                } => Some((message_id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn last_keyboard(&self) -> Option<Keyboard> {
        self.last_keyboard.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn reply(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageHandle, TransportError> {
        let message_id = self.next_id();
        self.push(Event::Reply {
            chat,
            message_id,
            text: text.to_string(),
            has_keyboard: keyboard.is_some(),
        });
        if let Some(keyboard) = keyboard {
            *self.last_keyboard.lock().unwrap() = Some(keyboard);
        }
        Ok(MessageHandle {
            chat_id: chat,
            message_id,
        })
    }

    async fn edit(
        &self,
        message: &MessageHandle,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.push(Event::Edit {
            message_id: message.message_id,
            text: text.to_string(),
            has_keyboard: keyboard.is_some(),
        });
        if let Some(keyboard) = keyboard {
            *self.last_keyboard.lock().unwrap() = Some(keyboard);
        }
        Ok(())
    }

    async fn delete(&self, message: &MessageHandle) -> Result<(), TransportError> {
        self.push(Event::Delete {
            message_id: message.message_id,
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        caption: &str,
        progress: UploadProgress,
    ) -> Result<MessageHandle, TransportError> {
        let bytes = tokio::fs::metadata(path)
            .await
            .map_err(|e| TransportError::send(format!("stat {}: {e}", path.display())))?
            .len();
        let _ = progress.send((bytes / 2, bytes));
        let _ = progress.send((bytes, bytes));
        let message_id = self.next_id();
        self.push(Event::Document {
            chat,
            message_id,
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            caption: caption.to_string(),
            bytes,
        });
        Ok(MessageHandle {
            chat_id: chat,
            message_id,
        })
    }

    async fn ack(&self, text: &str) -> Result<(), TransportError> {
        self.push(Event::Ack {
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Backend returning the same scripted records for every strategy.
pub struct FixedBackend {
    records: Vec<RawRecord>,
}

impl FixedBackend {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CatalogBackend for FixedBackend {
    async fn search(
        &self,
        _query: &str,
        strategy: SearchStrategy,
    ) -> Result<Vec<RawRecord>, SearchError> {
        // Only one strategy returns, so the dedup pass stays simple.
        if strategy == SearchStrategy::Default {
            Ok(self.records.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// A complete raw record pointing at `mirror_url`.
pub fn raw_record(id: &str, title: &str, mirror_url: &str) -> RawRecord {
    RawRecord {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
        author: Some("Test Author".to_string()),
        size: Some("1 Mb".to_string()),
        extension: Some("pdf".to_string()),
        mirror_url: Some(mirror_url.to_string()),
    }
}
