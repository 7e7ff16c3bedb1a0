//! Console transport for CLI runs.
//!
//! Implements the messaging [`Transport`] against the terminal: replies
//! and acks print, edits drive an indicatif spinner, and documents are
//! "uploaded" by streaming them into the output directory while
//! emitting byte-progress samples the way a real transport would.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use bookrelay::delivery::UploadProgress;
use bookrelay::session::Keyboard;
use bookrelay::{ChatId, MessageHandle, Transport, TransportError};

/// Copy granularity for console "uploads".
const COPY_CHUNK_BYTES: usize = 1024 * 1024;

/// Terminal-backed transport.
pub struct ConsoleTransport {
    output_dir: PathBuf,
    spinner: ProgressBar,
    next_message_id: AtomicI64,
    last_keyboard: Mutex<Option<Keyboard>>,
    last_reply: Mutex<Option<MessageHandle>>,
}

impl ConsoleTransport {
    /// Creates a transport delivering files into `output_dir`.
    pub fn new(output_dir: PathBuf, quiet: bool) -> Self {
        let spinner = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            output_dir,
            spinner,
            next_message_id: AtomicI64::new(1),
            last_keyboard: Mutex::new(None),
            last_reply: Mutex::new(None),
        }
    }

    /// The most recent reply handle, for feeding callbacks back in.
    pub fn last_reply(&self) -> Option<MessageHandle> {
        self.last_reply.lock().ok().and_then(|g| g.clone())
    }

    /// The download action token of the `index`-th result row in the
    /// last rendered keyboard.
    pub fn download_action(&self, index: usize) -> Option<String> {
        let guard = self.last_keyboard.lock().ok()?;
        let keyboard = guard.as_ref()?;
        keyboard
            .rows
            .iter()
            .filter_map(|row| row.first())
            .filter(|button| button.action.starts_with("lgdl_"))
            .nth(index)
            .map(|button| button.action.clone())
    }

    fn print_keyboard(&self, keyboard: &Keyboard) {
        for (row_index, row) in keyboard.rows.iter().enumerate() {
            for button in row {
                if button.action.starts_with("lgdl_") {
                    self.spinner
                        .println(format!("  [{row_index}] {}", button.label));
                }
            }
        }
    }

    fn next_handle(&self, chat: ChatId) -> MessageHandle {
        MessageHandle {
            chat_id: chat,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn reply(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageHandle, TransportError> {
        self.spinner.println(text.to_string());
        if let Some(keyboard) = keyboard {
            self.print_keyboard(&keyboard);
            if let Ok(mut guard) = self.last_keyboard.lock() {
                *guard = Some(keyboard);
            }
        }
        let handle = self.next_handle(chat);
        if let Ok(mut guard) = self.last_reply.lock() {
            *guard = Some(handle.clone());
        }
        Ok(handle)
    }

    async fn edit(
        &self,
        _message: &MessageHandle,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.spinner.set_message(text.to_string());
        if let Some(keyboard) = keyboard {
            self.spinner.println(text.to_string());
            self.print_keyboard(&keyboard);
            if let Ok(mut guard) = self.last_keyboard.lock() {
                *guard = Some(keyboard);
            }
        }
        Ok(())
    }

    async fn delete(&self, _message: &MessageHandle) -> Result<(), TransportError> {
        self.spinner.set_message(String::new());
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        caption: &str,
        progress: UploadProgress,
    ) -> Result<MessageHandle, TransportError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| TransportError::send("document path has no file name"))?;
        let dest = self.output_dir.join(file_name);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| TransportError::send(format!("create output dir: {e}")))?;

        let mut source = tokio::fs::File::open(path)
            .await
            .map_err(|e| TransportError::send(format!("open {}: {e}", path.display())))?;
        let total = source
            .metadata()
            .await
            .map_err(|e| TransportError::send(format!("stat {}: {e}", path.display())))?
            .len();
        let mut target = tokio::fs::File::create(&dest)
            .await
            .map_err(|e| TransportError::send(format!("create {}: {e}", dest.display())))?;

        let mut copied: u64 = 0;
        let mut buffer = vec![0u8; COPY_CHUNK_BYTES];
        loop {
            let read = source
                .read(&mut buffer)
                .await
                .map_err(|e| TransportError::send(format!("read: {e}")))?;
            if read == 0 {
                break;
            }
            target
                .write_all(&buffer[..read])
                .await
                .map_err(|e| TransportError::send(format!("write: {e}")))?;
            copied += read as u64;
            let _ = progress.send((copied, total));
        }
        target
            .flush()
            .await
            .map_err(|e| TransportError::send(format!("flush: {e}")))?;

        if !caption.is_empty() {
            self.spinner.println(format!("Delivered: {}", dest.display()));
            for line in caption.lines() {
                self.spinner.println(format!("  {line}"));
            }
        }
        Ok(self.next_handle(chat))
    }

    async fn ack(&self, text: &str) -> Result<(), TransportError> {
        self.spinner.println(text.to_string());
        Ok(())
    }
}
