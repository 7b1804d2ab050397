//! Error types for the download module.
//!
//! Every variant maps onto one failure category and carries a human-readable
//! problem description plus a suggested remedy, so callers can render a
//! failed download without inspecting the underlying cause.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Host could not be resolved or no connection could be established.
    #[error("cannot reach {url}: {source}")]
    Unreachable {
        /// The URL that could not be reached.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The remote resource does not exist (HTTP 404 or 410).
    #[error("resource not found (HTTP {status}): {url}")]
    NotFound {
        /// The URL that was not found.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server rejected a `Range` request (HTTP 416).
    #[error("range starting at byte {offset} not satisfiable for {url}")]
    RangeNotSatisfiable {
        /// The URL of the ranged request.
        url: String,
        /// The offset that was requested.
        offset: u64,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Reading the response body failed part-way through.
    #[error("transfer from {url} interrupted: {source}")]
    Stream {
        /// The URL being read.
        url: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The destination file could not be opened, written, or renamed.
    #[error("IO error writing to {path}: {source}")]
    LocalStorage {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The background worker stopped before producing a result.
    #[error("download task stopped unexpectedly: {reason}")]
    TaskAborted {
        /// What the join handle reported.
        reason: String,
    },
}

impl DownloadError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unreachable-host error.
    pub fn unreachable(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Unreachable {
            url: url.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(url: impl Into<String>, status: u16) -> Self {
        Self::NotFound {
            url: url.into(),
            status,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a range-not-satisfiable error.
    pub fn range_not_satisfiable(url: impl Into<String>, offset: u64) -> Self {
        Self::RangeNotSatisfiable {
            url: url.into(),
            offset,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an interrupted-transfer error.
    pub fn stream(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Stream {
            url: url.into(),
            source,
        }
    }

    /// Creates a local storage error.
    pub fn local_storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalStorage {
            path: path.into(),
            source,
        }
    }

    /// Creates a task-aborted error.
    pub fn task_aborted(reason: impl Into<String>) -> Self {
        Self::TaskAborted {
            reason: reason.into(),
        }
    }

    /// Human-readable description of what went wrong.
    ///
    /// `attempts` is only used for retried transient failures.
    #[must_use]
    pub fn problem(&self, attempts: u32) -> String {
        match self {
            Self::InvalidUrl { .. } => "This is an invalid URL (link).".to_string(),
            Self::Unreachable { .. } => {
                "There is no Internet connection or the website does not exist.".to_string()
            }
            Self::NotFound { .. } => "The link (URL) is broken or missing.".to_string(),
            Self::LocalStorage { .. } => "There is a local storage issue.".to_string(),
            Self::TaskAborted { .. } => "The download stopped unexpectedly.".to_string(),
            Self::HttpStatus { status, .. } if !is_retryable_status(*status) => {
                format!("The server refused the request (HTTP {status}).")
            }
            Self::HttpStatus { .. }
            | Self::RangeNotSatisfiable { .. }
            | Self::Timeout { .. }
            | Self::Stream { .. } => format!("Download failed after {attempts} tries."),
        }
    }

    /// Suggested remedy matching [`problem`](Self::problem).
    #[must_use]
    pub fn remedy(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "A valid URL (link) is required.",
            Self::Unreachable { .. } => {
                "A working Internet connection or a valid website address is required."
            }
            Self::NotFound { .. } => "An existing link (URL) is required.",
            Self::LocalStorage { .. } => "A writable location is required.",
            Self::TaskAborted { .. } => "Retry the download.",
            Self::HttpStatus { status, .. } if !is_retryable_status(*status) => {
                "Check the link (URL) or try again later."
            }
            Self::HttpStatus { .. }
            | Self::RangeNotSatisfiable { .. }
            | Self::Timeout { .. }
            | Self::Stream { .. } => "A better download URL or network conditions.",
        }
    }
}

/// Statuses worth retrying on a connection that was otherwise valid.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}
