//! Resumable Fetch Library
//!
//! Downloads a single remote file over HTTP(S) to local storage, continuing
//! partial files with range requests and retrying interrupted transfers.
//!
//! # Architecture
//!
//! - [`download`] - request model, transport, resumable task, background handle

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{
    Destination, DownloadError, DownloadEvent, DownloadHandle, DownloadRequest, DownloadResult,
    Downloader, HttpClient, RetryPolicy,
};
