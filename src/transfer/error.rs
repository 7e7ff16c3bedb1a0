//! Error types for the transfer module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a remote file to local storage.
#[derive(Debug, Error)]
pub enum TransferError {
    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network-level error (DNS, connection refused, TLS, mid-stream
    /// resets). Retried as a whole attempt.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The transfer exceeded its overall time ceiling. Retried as a
    /// whole attempt.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-200 response. Terminal for the transfer.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Advertised content length exceeds the relay cap. Terminal and
    /// never retried; the user is pointed at the direct link.
    #[error("file too large: {bytes} bytes advertised, cap {limit} bytes")]
    TooLarge {
        /// The direct download URL, for the manual-fallback message.
        url: String,
        /// Advertised size in bytes.
        bytes: u64,
        /// Configured cap in bytes.
        limit: u64,
    },

    /// Local file system error after the per-chunk retries were
    /// exhausted. Terminal for the transfer.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for transport-level failures worth a whole-attempt retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}
