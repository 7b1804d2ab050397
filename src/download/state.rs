//! Per-download bookkeeping threaded through every attempt.
//!
//! [`DownloadState`] is a plain value: each transition consumes the old state
//! and returns the next one, so the task never mutates shared fields and each
//! step can be checked on its own.

use std::path::{Path, PathBuf};

/// How the first transfer should start, given what is already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// The file is already complete; transfer nothing.
    AlreadyComplete,
    /// Continue from this byte offset with a range request.
    Resume(u64),
    /// Start over, truncating whatever exists.
    Fresh,
}

/// Decides how to treat `existing` bytes for a resource of `expected` size.
///
/// Resuming needs a known size strictly larger than what is on disk; anything
/// else (unknown size, oversized file) starts fresh.
#[must_use]
pub fn plan_resume(existing: u64, expected: Option<u64>) -> ResumePlan {
    match expected {
        Some(total) if existing == total && total > 0 => ResumePlan::AlreadyComplete,
        Some(total) if existing > 0 && existing < total => ResumePlan::Resume(existing),
        _ => ResumePlan::Fresh,
    }
}

/// Mutable-by-replacement state of one running download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadState {
    path: PathBuf,
    expected_size: Option<u64>,
    bytes_on_disk: u64,
    transferred: u64,
    attempt: u32,
    resumed: bool,
}

impl DownloadState {
    /// State at task start: nothing known, first attempt.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            expected_size: None,
            bytes_on_disk: 0,
            transferred: 0,
            attempt: 1,
            resumed: false,
        }
    }

    /// Moves the download to a different local path.
    #[must_use]
    pub fn with_path(self, path: PathBuf) -> Self {
        Self { path, ..self }
    }

    /// Records the total size advertised by the server.
    #[must_use]
    pub fn with_expected_size(self, expected_size: Option<u64>) -> Self {
        Self {
            expected_size,
            ..self
        }
    }

    /// Continues after `offset` bytes that are already on disk.
    #[must_use]
    pub fn resumed_from(self, offset: u64) -> Self {
        Self {
            bytes_on_disk: offset,
            resumed: offset > 0,
            ..self
        }
    }

    /// Forgets everything on disk; the next write truncates.
    #[must_use]
    pub fn restarted(self) -> Self {
        Self {
            bytes_on_disk: 0,
            resumed: false,
            ..self
        }
    }

    /// Accounts for `len` bytes written by the transfer loop.
    #[must_use]
    pub fn record_chunk(self, len: u64) -> Self {
        Self {
            bytes_on_disk: self.bytes_on_disk.saturating_add(len),
            transferred: self.transferred.saturating_add(len),
            ..self
        }
    }

    /// Counts another attempt.
    #[must_use]
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self
        }
    }

    /// Offset a reconnect should resume from, when resuming is possible.
    ///
    /// Without a known total size a reconnect must start from zero.
    #[must_use]
    pub fn resume_offset(&self) -> Option<u64> {
        self.expected_size
            .filter(|_| self.bytes_on_disk > 0)
            .map(|_| self.bytes_on_disk)
    }

    /// Current local path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total size, when the server advertised one.
    #[must_use]
    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    /// Total size with `-1` meaning unknown.
    #[must_use]
    pub fn expected_size_signed(&self) -> i64 {
        self.expected_size
            .and_then(|size| i64::try_from(size).ok())
            .unwrap_or(-1)
    }

    /// Size of the local file.
    #[must_use]
    pub fn bytes_on_disk(&self) -> u64 {
        self.bytes_on_disk
    }

    /// Bytes received over the network by this task.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Current attempt number (1-indexed).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether the file on disk continues an earlier partial download.
    #[must_use]
    pub fn resumed(&self) -> bool {
        self.resumed
    }
}
