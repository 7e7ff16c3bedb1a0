//! Constants for the transfer module (limits, chunking, retry timing).

use std::time::Duration;

/// Ceiling for one whole download, connect included.
pub const TOTAL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Files advertising more than this are not relayed; the user gets the
/// direct link instead.
pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Write granularity for streamed downloads.
pub const DOWNLOAD_CHUNK_BYTES: usize = 2 * 1024 * 1024;

/// Above this size the progress cadence switches to the coarse
/// MB-denominated rendering.
pub const LARGE_FILE_BYTES: u64 = 30 * 1024 * 1024;

/// Attempts per chunk write before the transfer is declared failed.
pub const CHUNK_WRITE_ATTEMPTS: u32 = 3;

/// Pause between chunk write attempts.
pub const CHUNK_WRITE_PAUSE: Duration = Duration::from_secs(1);

/// Whole-transfer attempts for transport-level failures.
pub const TRANSFER_ATTEMPTS: u32 = 3;

/// Fixed backoff between whole-transfer attempts.
pub const TRANSFER_BACKOFF: Duration = Duration::from_secs(5);
