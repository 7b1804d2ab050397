//! Resumable single-file HTTP downloads.
//!
//! A download continues a partial local file with a `Range` request when the
//! server advertises the total size, survives transient network failures by
//! reconnecting a bounded number of times, and reports progress as the number
//! of bytes on disk.
//!
//! # Features
//!
//! - Streaming transfer in fixed-size chunks
//! - Range resume of partial files, skip of already complete files
//! - Filename from `Content-Disposition`, URL path, or MIME type
//! - Cooperative cancellation that keeps the partial file
//! - Problem/remedy diagnostics for every failure category
//!
//! # Example
//!
//! ```no_run
//! use resumable_fetch::download::{DownloadEvent, DownloadRequest, Downloader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::with_http_client()?;
//! let mut handle = downloader.spawn(DownloadRequest::to_dir(
//!     "https://example.com/paper.pdf",
//!     "./downloads",
//! ));
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         DownloadEvent::Progress(bytes) => println!("{bytes} bytes"),
//!         DownloadEvent::Finished(result) => println!("done: {}", result.is_success()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod filename;
mod handle;
mod request;
mod result;
mod retry;
mod state;
mod task;
mod transport;

pub use client::HttpClient;
pub use error::DownloadError;
pub use handle::DownloadHandle;
pub use request::{Destination, DownloadRequest};
pub use result::{Diagnostic, DownloadEvent, DownloadResult};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use state::{DownloadState, ResumePlan, plan_resume};
pub use task::Downloader;
pub use transport::{BodyReader, OpenRequest, RemoteResponse, ResponseMeta, Transport};
