//! Connection seam between the download task and the network.
//!
//! The task only ever asks for "this URL, optionally from this offset" and
//! reads the body as a byte stream, so the retry/resume state machine can run
//! against [`HttpClient`](super::HttpClient) in production and against a
//! scripted transport in tests.

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use url::Url;

use super::DownloadError;

/// Parameters of one connection attempt.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    /// Resource to fetch.
    pub url: &'a Url,
    /// User-Agent override.
    pub user_agent: Option<&'a str>,
    /// Send `Range: bytes=<offset>-` when set.
    pub range_start: Option<u64>,
}

/// Response headers the task cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// The server answered a range request with `206 Partial Content`.
    pub partial: bool,
    /// `Content-Length` of this response body.
    pub content_length: Option<u64>,
    /// Raw `Content-Type` value.
    pub content_type: Option<String>,
    /// Raw `Content-Disposition` value.
    pub content_disposition: Option<String>,
}

impl ResponseMeta {
    /// Size of the whole resource, given that `range_start` bytes were skipped.
    ///
    /// A `206` body only covers the remainder; a `200` body is the whole thing.
    #[must_use]
    pub fn total_size(&self, range_start: u64) -> Option<u64> {
        if self.partial {
            self.content_length
                .map(|remaining| range_start.saturating_add(remaining))
        } else {
            self.content_length
        }
    }
}

/// Response body as an async byte source.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// An open response: headers plus an unread body.
pub struct RemoteResponse {
    /// Parsed headers.
    pub meta: ResponseMeta,
    /// Unread body.
    pub body: BodyReader,
}

impl fmt::Debug for RemoteResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResponse")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Opens connections for the download task.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects and returns headers plus the body stream.
    ///
    /// # Errors
    ///
    /// Implementations map their failures onto [`DownloadError`] variants so
    /// the task can classify them: connection failures as `Unreachable`,
    /// timeouts as `Timeout`, 404/410 as `NotFound`, 416 as
    /// `RangeNotSatisfiable`, any other non-success status as `HttpStatus`.
    async fn open(&self, request: OpenRequest<'_>) -> Result<RemoteResponse, DownloadError>;
}
