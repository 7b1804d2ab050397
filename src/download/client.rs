//! HTTP client wrapper implementing [`Transport`] over reqwest.
//!
//! The client is built once and reused for every connection attempt of a
//! download so reconnects share the pooled connection. Automatic response
//! decompression is off: resume offsets are byte positions on the wire.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RANGE, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use super::transport::{OpenRequest, RemoteResponse, ResponseMeta, Transport};
use crate::user_agent;

/// HTTP client for opening download connections.
///
/// # Example
///
/// ```no_run
/// use resumable_fetch::download::{HttpClient, OpenRequest, Transport};
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let url = Url::parse("https://example.com/file.pdf")?;
/// let response = client
///     .open(OpenRequest { url: &url, user_agent: None, range_start: Some(1024) })
///     .await?;
/// println!("partial: {}", response.meta.partial);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default connect timeout and no read timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the TLS backend or resolver cannot be
    /// initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(Duration::from_secs(CONNECT_TIMEOUT_SECS), None)
    }

    /// Creates a client with an explicit connect timeout and optional
    /// per-read timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent::default_user_agent());
        if let Some(read_timeout) = read_timeout {
            builder = builder.read_timeout(read_timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn send_request(
        &self,
        request: OpenRequest<'_>,
    ) -> Result<reqwest::Response, DownloadError> {
        let url = request.url.as_str();
        let mut builder = self.client.get(request.url.clone());
        if let Some(ua) = request.user_agent {
            builder = builder.header(USER_AGENT, ua);
        }
        if let Some(offset) = request.range_start {
            builder = builder.header(RANGE, format!("bytes={offset}-"));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::unreachable(url, e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        debug!(status = status.as_u16(), "server returned error status");
        Err(match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                DownloadError::not_found(url, status.as_u16())
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                DownloadError::range_not_satisfiable(url, request.range_start.unwrap_or(0))
            }
            _ => DownloadError::http_status(url, status.as_u16()),
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self, request), fields(url = %request.url, range_start = ?request.range_start))]
    async fn open(&self, request: OpenRequest<'_>) -> Result<RemoteResponse, DownloadError> {
        let response = self.send_request(request).await?;
        let meta = response_meta(response.status(), response.headers());
        debug!(
            partial = meta.partial,
            content_length = ?meta.content_length,
            content_type = ?meta.content_type,
            "connection open"
        );

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other));
        Ok(RemoteResponse {
            meta,
            body: Box::new(StreamReader::new(Box::pin(stream))),
        })
    }
}

fn response_meta(status: StatusCode, headers: &HeaderMap) -> ResponseMeta {
    ResponseMeta {
        partial: status == StatusCode::PARTIAL_CONTENT,
        content_length: header_str(headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok()),
        content_type: header_str(headers, CONTENT_TYPE.as_str()).map(str::to_string),
        content_disposition: header_str(headers, CONTENT_DISPOSITION.as_str())
            .map(str::to_string),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::test_support::socket_guard::start_mock_server_or_skip;

    async fn read_body(response: RemoteResponse) -> Vec<u8> {
        let mut body = response.body;
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await.unwrap();
        buf
    }

    fn open_request(url: &Url) -> OpenRequest<'_> {
        OpenRequest {
            url,
            user_agent: None,
            range_start: None,
        }
    }

    // ==================== Header Parsing Tests ====================

    #[test]
    fn test_response_meta_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "42".parse().unwrap());
        headers.insert(CONTENT_TYPE, "image/png".parse().unwrap());
        headers.insert(
            CONTENT_DISPOSITION,
            "attachment; filename=a.png".parse().unwrap(),
        );

        let meta = response_meta(StatusCode::OK, &headers);
        assert!(!meta.partial);
        assert_eq!(meta.content_length, Some(42));
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
        assert_eq!(
            meta.content_disposition.as_deref(),
            Some("attachment; filename=a.png")
        );
    }

    #[test]
    fn test_response_meta_partial_and_missing_length() {
        let meta = response_meta(StatusCode::PARTIAL_CONTENT, &HeaderMap::new());
        assert!(meta.partial);
        assert_eq!(meta.content_length, None);
        assert_eq!(meta.content_type, None);
    }

    #[test]
    fn test_response_meta_ignores_garbage_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "lots".parse().unwrap());
        let meta = response_meta(StatusCode::OK, &headers);
        assert_eq!(meta.content_length, None);
    }

    // ==================== Connection Tests ====================

    #[tokio::test]
    async fn test_open_full_response() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/file.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/plain")
                    .set_body_bytes(b"hello world"),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/file.txt", mock_server.uri())).unwrap();
        let response = client.open(open_request(&url)).await.unwrap();

        assert!(!response.meta.partial);
        assert_eq!(response.meta.content_length, Some(11));
        assert_eq!(response.meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(read_body(response).await, b"hello world");
    }

    #[tokio::test]
    async fn test_open_sends_range_header() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(header("Range", "bytes=5-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"world"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/file.bin", mock_server.uri())).unwrap();
        let response = client
            .open(OpenRequest {
                url: &url,
                user_agent: None,
                range_start: Some(5),
            })
            .await
            .unwrap();

        assert!(response.meta.partial);
        assert_eq!(response.meta.total_size(5), Some(10));
        assert_eq!(read_body(response).await, b"world");
    }

    #[tokio::test]
    async fn test_open_sends_default_user_agent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header("User-Agent", user_agent::default_user_agent().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/ua", mock_server.uri())).unwrap();
        assert!(client.open(open_request(&url)).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_sends_custom_user_agent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header("User-Agent", "Mozilla/5.0 (Custom)"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/ua", mock_server.uri())).unwrap();
        let result = client
            .open(OpenRequest {
                url: &url,
                user_agent: Some("Mozilla/5.0 (Custom)"),
                range_start: None,
            })
            .await;
        assert!(result.is_ok(), "custom UA must be sent: {result:?}");
    }

    // ==================== Status Mapping Tests ====================

    #[tokio::test]
    async fn test_open_maps_404_and_410_to_not_found() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        for (route, expected) in [("missing", 404), ("gone", 410)] {
            let url = Url::parse(&format!("{}/{route}", mock_server.uri())).unwrap();
            match client.open(open_request(&url)).await {
                Err(DownloadError::NotFound { status, .. }) => assert_eq!(status, expected),
                other => panic!("Expected NotFound, got: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_open_maps_416_to_range_not_satisfiable() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/short"))
            .respond_with(ResponseTemplate::new(416))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/short", mock_server.uri())).unwrap();
        let result = client
            .open(OpenRequest {
                url: &url,
                user_agent: None,
                range_start: Some(99),
            })
            .await;
        match result {
            Err(DownloadError::RangeNotSatisfiable { offset, .. }) => assert_eq!(offset, 99),
            other => panic!("Expected RangeNotSatisfiable, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_maps_500_to_http_status() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/error"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/error", mock_server.uri())).unwrap();
        match client.open(open_request(&url)).await {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 500),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_closed_port_is_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let Ok(listener) = std::net::TcpListener::bind("127.0.0.1:0") else {
            return;
        };
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/file")).unwrap();
        let result = client.open(open_request(&url)).await;
        assert!(
            matches!(
                result,
                Err(DownloadError::Unreachable { .. } | DownloadError::Timeout { .. })
            ),
            "Expected Unreachable, got: {result:?}"
        );
    }
}
