//! Streaming download engine with size gating and bounded retries.
//!
//! [`TransferEngine::fetch`] streams a remote file to local storage in
//! fixed-size chunks. An advertised content length over the cap aborts
//! immediately with [`TransferError::TooLarge`] after pointing the user
//! at the direct link; transport-level failures are retried as whole
//! attempts with a flat backoff; individual chunk writes get their own
//! short retry loop before the transfer is declared failed.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use super::constants::{
    CHUNK_WRITE_ATTEMPTS, CHUNK_WRITE_PAUSE, DOWNLOAD_CHUNK_BYTES, MAX_FILE_BYTES, TOTAL_TIMEOUT,
    TRANSFER_ATTEMPTS, TRANSFER_BACKOFF,
};
use super::progress::{ProgressReporter, ProgressSink};
use super::TransferError;

/// Tunable limits for one engine instance.
#[derive(Debug, Clone)]
pub struct TransferLimits {
    /// Ceiling for one whole download.
    pub total_timeout: Duration,
    /// Hard cap on advertised file size.
    pub max_file_bytes: u64,
    /// Write granularity.
    pub chunk_bytes: usize,
    /// Whole-transfer attempts for transient failures.
    pub attempts: u32,
    /// Flat backoff between whole-transfer attempts.
    pub backoff: Duration,
    /// Attempts per chunk write.
    pub chunk_write_attempts: u32,
    /// Pause between chunk write attempts.
    pub chunk_write_pause: Duration,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            total_timeout: TOTAL_TIMEOUT,
            max_file_bytes: MAX_FILE_BYTES,
            chunk_bytes: DOWNLOAD_CHUNK_BYTES,
            attempts: TRANSFER_ATTEMPTS,
            backoff: TRANSFER_BACKOFF,
            chunk_write_attempts: CHUNK_WRITE_ATTEMPTS,
            chunk_write_pause: CHUNK_WRITE_PAUSE,
        }
    }
}

/// Downloads remote files to local storage with progress feedback.
pub struct TransferEngine {
    client: Client,
    limits: TransferLimits,
}

impl TransferEngine {
    /// Creates an engine with the given limits.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Client`] if HTTP client construction
    /// fails.
    pub fn new(limits: TransferLimits) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(limits.total_timeout)
            .build()
            .map_err(TransferError::Client)?;
        Ok(Self { client, limits })
    }

    /// Fetches `url` into `dest`, pushing throttled progress through
    /// `sink`.
    ///
    /// Transient (network/timeout) failures are retried up to the
    /// configured attempt count with a flat backoff; every attempt
    /// restarts the file from scratch. All other failures are terminal
    /// for the transfer.
    ///
    /// # Errors
    ///
    /// [`TransferError::TooLarge`] when the advertised length exceeds
    /// the cap (a manual-fallback message with the direct link has
    /// already been pushed through the sink), [`TransferError::HttpStatus`]
    /// for non-200 responses, [`TransferError::Io`] when a chunk write
    /// exhausts its retries, and [`TransferError::Network`]/
    /// [`TransferError::Timeout`] when all whole-transfer attempts fail.
    #[instrument(skip(self, sink, reporter), fields(dest = %dest.display()))]
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        sink: &mut dyn ProgressSink,
        reporter: &mut ProgressReporter,
    ) -> Result<(), TransferError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.fetch_once(url, dest, sink, reporter).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt < self.limits.attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.limits.attempts,
                        error = %error,
                        "transfer attempt failed; retrying"
                    );
                    tokio::time::sleep(self.limits.backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        sink: &mut dyn ProgressSink,
        reporter: &mut ProgressReporter,
    ) -> Result<(), TransferError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest(url, e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(TransferError::http_status(url, status.as_u16()));
        }

        let total = response.content_length().filter(|&len| len > 0);

        if let Some(total) = total {
            if total > self.limits.max_file_bytes {
                // Terminal: point the user at the direct link instead.
                reporter
                    .force(
                        sink,
                        format!(
                            "File size limit exceeded: {}MB (max {}MB). \
                             Download directly: {url}",
                            total / (1024 * 1024),
                            self.limits.max_file_bytes / (1024 * 1024),
                        ),
                    )
                    .await;
                return Err(TransferError::TooLarge {
                    url: url.to_string(),
                    bytes: total,
                    limit: self.limits.max_file_bytes,
                });
            }
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| TransferError::io(dest, e))?;

        let downloaded = self
            .copy_stream(
                response.bytes_stream(),
                &mut file,
                dest,
                url,
                total,
                sink,
                reporter,
            )
            .await?;
        file.flush().await.map_err(|e| TransferError::io(dest, e))?;

        debug!(bytes = downloaded, "transfer completed");
        Ok(())
    }

    /// Drains a body stream into `writer`, buffering to the configured
    /// chunk granularity and reporting progress per frame. Returns the
    /// number of bytes streamed.
    #[allow(clippy::too_many_arguments)]
    async fn copy_stream<S, B, W>(
        &self,
        mut stream: S,
        writer: &mut W,
        dest: &Path,
        url: &str,
        total: Option<u64>,
        sink: &mut dyn ProgressSink,
        reporter: &mut ProgressReporter,
    ) -> Result<u64, TransferError>
    where
        S: futures_util::Stream<Item = Result<B, reqwest::Error>> + Unpin,
        B: AsRef<[u8]>,
        W: AsyncWrite + Unpin + Send,
    {
        let mut buffer: Vec<u8> = Vec::with_capacity(self.limits.chunk_bytes);
        let mut downloaded: u64 = 0;

        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|e| classify_reqwest(url, e))?;
            let frame = frame.as_ref();
            if frame.is_empty() {
                continue;
            }

            buffer.extend_from_slice(frame);
            downloaded += frame.len() as u64;

            if buffer.len() >= self.limits.chunk_bytes {
                self.write_chunk(writer, dest, &buffer).await?;
                buffer.clear();
            }

            if let Some(total) = total {
                reporter.report(sink, downloaded, total).await;
            }
        }

        if !buffer.is_empty() {
            self.write_chunk(writer, dest, &buffer).await?;
        }
        Ok(downloaded)
    }

    /// Writes one chunk with the configured short retry loop. An
    /// exhausted retry loop fails the whole transfer.
    async fn write_chunk<W>(&self, writer: &mut W, dest: &Path, chunk: &[u8]) -> Result<(), TransferError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match writer.write_all(chunk).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt < self.limits.chunk_write_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.limits.chunk_write_attempts,
                        error = %error,
                        "chunk write failed; pausing before retry"
                    );
                    tokio::time::sleep(self.limits.chunk_write_pause).await;
                }
                Err(error) => return Err(TransferError::io(dest, error)),
            }
        }
    }
}

/// Maps a reqwest error onto the transfer taxonomy.
fn classify_reqwest(url: &str, error: reqwest::Error) -> TransferError {
    if error.is_timeout() {
        TransferError::timeout(url)
    } else {
        TransferError::network(url, error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::progress::{ProgressLedger, SinkError};
    use super::*;

    struct NullSink;

    #[async_trait::async_trait]
    impl ProgressSink for NullSink {
        async fn update(&mut self, _text: &str) -> Result<(), SinkError> {
            Ok(())
        }
    }

    /// Writer that fails a scripted number of times before accepting
    /// writes, counting the bytes that eventually land.
    struct FlakyWriter {
        failures_left: u32,
        written: Vec<u8>,
    }

    impl FlakyWriter {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: failures,
                written: Vec::new(),
            }
        }
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Poll::Ready(Err(io::Error::other("transient disk error")));
            }
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn test_engine() -> TransferEngine {
        TransferEngine::new(TransferLimits {
            chunk_write_pause: Duration::from_millis(1),
            ..TransferLimits::default()
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_write_retries_twice_then_succeeds() {
        let engine = test_engine();
        let mut writer = FlakyWriter::new(2);
        let chunk = vec![7u8; 4096];

        engine
            .write_chunk(&mut writer, Path::new("/tmp/out"), &chunk)
            .await
            .unwrap();

        assert_eq!(writer.written.len(), chunk.len());
    }

    #[tokio::test]
    async fn test_flaky_writes_recover_within_one_transfer() {
        let server = MockServer::start().await;
        // Spans two chunk writes at the default 2MB granularity.
        let body = vec![42u8; 3 * 1024 * 1024];
        Mock::given(method("GET"))
            .and(path("/book.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let engine = test_engine();
        let response = engine
            .client
            .get(format!("{}/book.pdf", server.uri()))
            .send()
            .await
            .unwrap();
        let total = response.content_length();
        assert_eq!(total, Some(body.len() as u64));

        // The first chunk write fails twice, then the transfer streams
        // through to the advertised length without restarting.
        let mut writer = FlakyWriter::new(2);
        let mut sink = NullSink;
        let mut reporter = ProgressReporter::download(1, ProgressLedger::new());
        let streamed = engine
            .copy_stream(
                response.bytes_stream(),
                &mut writer,
                Path::new("/tmp/out"),
                "unused",
                total,
                &mut sink,
                &mut reporter,
            )
            .await
            .unwrap();

        assert_eq!(streamed, body.len() as u64);
        assert_eq!(writer.written, body);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_write_fails_after_exhausted_attempts() {
        let engine = test_engine();
        let mut writer = FlakyWriter::new(3);
        let chunk = vec![7u8; 16];

        let error = engine
            .write_chunk(&mut writer, Path::new("/tmp/out"), &chunk)
            .await
            .unwrap_err();

        assert!(matches!(error, TransferError::Io { .. }));
        assert!(writer.written.is_empty());
    }
}
