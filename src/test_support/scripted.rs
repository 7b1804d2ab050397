//! In-memory [`Transport`] that replays a fixed list of responses.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use tokio_util::io::StreamReader;

use crate::download::{DownloadError, OpenRequest, RemoteResponse, ResponseMeta, Transport};

/// One body piece: data, or an I/O failure of the given kind.
pub type Piece = Result<&'static [u8], io::ErrorKind>;

/// What the next `open` call does.
pub enum Step {
    /// Answer with these headers and body pieces.
    Respond {
        meta: ResponseMeta,
        pieces: Vec<Piece>,
    },
    /// Fail the connection.
    Fail(fn(&str) -> DownloadError),
    /// Panic inside the transport.
    Panic,
}

impl Step {
    /// `200 OK` with a `Content-Length` header.
    pub fn ok(content_length: Option<u64>, pieces: Vec<Piece>) -> Self {
        Self::Respond {
            meta: ResponseMeta {
                content_length,
                ..ResponseMeta::default()
            },
            pieces,
        }
    }

    /// `206 Partial Content` carrying `remaining` bytes.
    pub fn partial(remaining: u64, pieces: Vec<Piece>) -> Self {
        Self::Respond {
            meta: ResponseMeta {
                partial: true,
                content_length: Some(remaining),
                ..ResponseMeta::default()
            },
            pieces,
        }
    }

    /// Same step with the given response headers merged in.
    pub fn with_headers(
        self,
        content_type: Option<&str>,
        content_disposition: Option<&str>,
    ) -> Self {
        match self {
            Self::Respond { mut meta, pieces } => {
                meta.content_type = content_type.map(str::to_string);
                meta.content_disposition = content_disposition.map(str::to_string);
                Self::Respond { meta, pieces }
            }
            other => other,
        }
    }
}

/// Replays [`Step`]s in order and records each request's range start.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    ranges: Mutex<Vec<Option<u64>>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ranges: Mutex::new(Vec::new()),
        }
    }

    /// Range start of every `open` call so far, in order.
    #[allow(clippy::unwrap_used)]
    pub fn ranges(&self) -> Vec<Option<u64>> {
        self.ranges.lock().unwrap().clone()
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.ranges().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    #[allow(clippy::unwrap_used)]
    async fn open(&self, request: OpenRequest<'_>) -> Result<RemoteResponse, DownloadError> {
        self.ranges.lock().unwrap().push(request.range_start);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Fail(|url| DownloadError::timeout(url)));

        match step {
            Step::Respond { meta, pieces } => {
                let body = stream::iter(
                    pieces
                        .into_iter()
                        .map(|piece| piece.map(Bytes::from_static).map_err(io::Error::from)),
                );
                Ok(RemoteResponse {
                    meta,
                    body: Box::new(StreamReader::new(body)),
                })
            }
            Step::Fail(make_error) => Err(make_error(request.url.as_str())),
            Step::Panic => panic!("scripted transport panic"),
        }
    }
}
