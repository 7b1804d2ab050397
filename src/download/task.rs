//! The resumable download task.
//!
//! [`Downloader::fetch`] drives one download from the first connection to a
//! terminal [`DownloadResult`]:
//!
//! 1. Connect without a range and read the headers. A failure here ends the
//!    download immediately.
//! 2. For directory destinations, rename from `Content-Disposition`.
//! 3. Compare the local file with the advertised size: skip the transfer when
//!    it is complete, reconnect with `Range: bytes=<len>-` when it is a prefix,
//!    otherwise overwrite it.
//! 4. Copy the body in fixed-size chunks, reporting bytes on disk after each.
//! 5. On a transient failure, reconnect (resuming when the size is known) until
//!    the [`RetryPolicy`] runs out of attempts.
//! 6. Fix a placeholder `.bin` extension from the response MIME type.
//!
//! Cancellation is checked before every read. It cannot interrupt a read that
//! is already waiting on the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::CHUNK_SIZE;
use super::filename::{
    extension_for_mime, has_placeholder_extension, parse_content_disposition,
    replace_placeholder_extension, resolve_unique_path, sanitize_filename,
};
use super::request::DownloadRequest;
use super::result::{Diagnostic, DownloadResult};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::state::{DownloadState, ResumePlan, plan_resume};
use super::transport::{OpenRequest, RemoteResponse, Transport};
use super::{DownloadError, HttpClient};

/// Runs downloads over a [`Transport`] with a retry policy.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    chunk_size: usize,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("retry_policy", &self.retry_policy)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// How one connection attempt ended.
enum Attempt {
    /// All bytes are on disk; carries the `Content-Type` of the final response.
    Finished(DownloadState, Option<String>),
    Cancelled(DownloadState),
    Failed(DownloadState, DownloadError),
}

impl Downloader {
    /// Creates a downloader with the default retry policy and chunk size.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry_policy: RetryPolicy::default(),
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Creates a downloader over a default [`HttpClient`].
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the HTTP client cannot be built.
    pub fn with_http_client() -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpClient::new()?)))
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replaces the read size of the transfer loop (at least one byte).
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Downloads `request` on the current task.
    ///
    /// `on_progress` receives the number of bytes on disk after every chunk;
    /// values never decrease, even when a reconnect has to start over.
    /// Exactly one [`DownloadResult`] is returned and no error escapes.
    #[instrument(skip(self, request, cancel, on_progress), fields(url = %request.url()))]
    pub async fn fetch<F>(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> DownloadResult
    where
        F: FnMut(u64) + Send,
    {
        let mut progress = Progress::new(on_progress);

        let url = match request.parsed_url() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "rejecting download");
                return DownloadResult::failed(e, 1);
            }
        };

        let state = DownloadState::new(request.initial_path(&url));
        info!(path = %state.path().display(), "starting download");

        let probe = OpenRequest {
            url: &url,
            user_agent: request.user_agent(),
            range_start: None,
        };
        let response = match self.transport.open(probe).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "initial connection failed");
                return initial_failure(e);
            }
        };

        let probe_mime = response.meta.content_type.clone();
        let mut state = state.with_expected_size(response.meta.total_size(0));
        if let Some(path) = disposition_path(request, response.meta.content_disposition.as_deref())
        {
            debug!(path = %path.display(), "using server-suggested filename");
            state = state.with_path(path);
        }

        let existing = existing_len(state.path()).await;
        let mut pending = match plan_resume(existing, state.expected_size()) {
            ResumePlan::AlreadyComplete => {
                info!(bytes = existing, "file already complete, skipping transfer");
                drop(response);
                let state = state.resumed_from(existing);
                progress.report(state.bytes_on_disk());
                return complete(request, state, probe_mime).await;
            }
            ResumePlan::Resume(offset) => {
                debug!(offset, "resuming partial file");
                drop(response);
                state = state.resumed_from(offset);
                None
            }
            ResumePlan::Fresh => {
                if existing > 0 {
                    debug!(existing, "overwriting existing file");
                }
                Some(response)
            }
        };

        loop {
            let outcome = self
                .attempt(&url, request, state, pending.take(), cancel, &mut progress)
                .await;

            match outcome {
                Attempt::Finished(done, mime_type) => {
                    let mime_type = mime_type.or(probe_mime);
                    return complete(request, done, mime_type).await;
                }
                Attempt::Cancelled(stopped) => {
                    info!(bytes = stopped.bytes_on_disk(), "download cancelled");
                    return DownloadResult::Cancelled {
                        path: stopped.path().to_path_buf(),
                        bytes_on_disk: stopped.bytes_on_disk(),
                        diagnostic: Diagnostic::cancelled(stopped.attempt()),
                    };
                }
                Attempt::Failed(failed, error) => {
                    let attempt = failed.attempt();
                    match self
                        .retry_policy
                        .should_retry(classify_error(&error), attempt)
                    {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            warn!(
                                attempt = next_attempt,
                                max_attempts = self.retry_policy.max_attempts(),
                                delay_ms = delay.as_millis(),
                                bytes_on_disk = failed.bytes_on_disk(),
                                error = %error,
                                "transfer interrupted, retrying"
                            );
                            tokio::select! {
                                () = cancel.cancelled() => {}
                                () = tokio::time::sleep(delay) => {}
                            }
                            state = failed.next_attempt();
                            if matches!(error, DownloadError::RangeNotSatisfiable { .. }) {
                                state = state.restarted();
                            }
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(attempts = attempt, %reason, error = %error, "download failed");
                            // A transient error is only refused once attempts run out.
                            if classify_error(&error) == FailureType::Transient {
                                return DownloadResult::Failed(Diagnostic::retries_exhausted(
                                    error, attempt,
                                ));
                            }
                            return DownloadResult::failed(error, attempt);
                        }
                    }
                }
            }
        }
    }

    /// One connection plus transfer.
    ///
    /// `response` is an already open full-body response to consume; without
    /// one, a new connection is made that resumes from the bytes on disk when
    /// the total size is known.
    async fn attempt<F: FnMut(u64)>(
        &self,
        url: &Url,
        request: &DownloadRequest,
        state: DownloadState,
        response: Option<RemoteResponse>,
        cancel: &CancellationToken,
        progress: &mut Progress<F>,
    ) -> Attempt {
        if cancel.is_cancelled() {
            return Attempt::Cancelled(state);
        }

        let (state, response) = match response {
            Some(response) => (state, response),
            None => match self.reconnect(url, request, state).await {
                Ok(connected) => connected,
                Err((state, e)) => return Attempt::Failed(state, e),
            },
        };

        let append = state.bytes_on_disk() > 0;
        let file = match open_output(state.path(), append).await {
            Ok(file) => file,
            Err(e) => return Attempt::Failed(state, e),
        };

        self.transfer(url, state, file, response, cancel, progress)
            .await
    }

    async fn reconnect(
        &self,
        url: &Url,
        request: &DownloadRequest,
        state: DownloadState,
    ) -> Result<(DownloadState, RemoteResponse), (DownloadState, DownloadError)> {
        let range_start = state.resume_offset();
        let state = if range_start.is_none() {
            state.restarted()
        } else {
            state
        };

        let open = OpenRequest {
            url,
            user_agent: request.user_agent(),
            range_start,
        };
        let response = match self.transport.open(open).await {
            Ok(response) => response,
            Err(e) => return Err((state, e)),
        };

        let state = match range_start {
            Some(offset) if !response.meta.partial => {
                debug!(offset, "server ignored range request, starting over");
                state.restarted()
            }
            _ => state,
        };
        let state = if state.expected_size().is_none() {
            let total = response.meta.total_size(state.bytes_on_disk());
            state.with_expected_size(total)
        } else {
            state
        };
        Ok((state, response))
    }

    /// Copies the body into `file` until end of stream, cancellation, or error.
    async fn transfer<F: FnMut(u64)>(
        &self,
        url: &Url,
        mut state: DownloadState,
        mut file: File,
        response: RemoteResponse,
        cancel: &CancellationToken,
        progress: &mut Progress<F>,
    ) -> Attempt {
        let RemoteResponse { meta, mut body } = response;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            if cancel.is_cancelled() {
                if let Err(e) = file.flush().await {
                    warn!(error = %e, "flush after cancellation failed");
                }
                return Attempt::Cancelled(state);
            }

            let read = match body.read(&mut buf).await {
                Ok(read) => read,
                Err(e) => {
                    if let Err(flush_error) = file.flush().await {
                        warn!(error = %flush_error, "flush after read error failed");
                    }
                    return Attempt::Failed(state, DownloadError::stream(url.as_str(), e));
                }
            };
            if read == 0 {
                break;
            }

            if let Err(e) = file.write_all(&buf[..read]).await {
                let error = DownloadError::local_storage(state.path(), e);
                return Attempt::Failed(state, error);
            }
            state = state.record_chunk(read as u64);
            progress.report(state.bytes_on_disk());
        }

        if let Err(e) = file.flush().await {
            let error = DownloadError::local_storage(state.path(), e);
            return Attempt::Failed(state, error);
        }

        match state.expected_size() {
            Some(total) if state.bytes_on_disk() < total => {
                let short = std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "connection closed at byte {} of {total}",
                        state.bytes_on_disk()
                    ),
                );
                Attempt::Failed(state, DownloadError::stream(url.as_str(), short))
            }
            _ => Attempt::Finished(state, meta.content_type),
        }
    }
}

/// Progress callback wrapper that never reports a smaller value than before.
struct Progress<F> {
    callback: F,
    highest: u64,
}

impl<F: FnMut(u64)> Progress<F> {
    fn new(callback: F) -> Self {
        Self {
            callback,
            highest: 0,
        }
    }

    fn report(&mut self, bytes_on_disk: u64) {
        self.highest = self.highest.max(bytes_on_disk);
        (self.callback)(self.highest);
    }
}

/// Result for a failed first connection, which is never retried.
///
/// Unreachable hosts and permanent errors keep their own wording; any other
/// transient failure reads as a missing network connection.
fn initial_failure(error: DownloadError) -> DownloadResult {
    if matches!(error, DownloadError::Unreachable { .. })
        || classify_error(&error) == FailureType::Permanent
    {
        return DownloadResult::failed(error, 1);
    }
    DownloadResult::Failed(Diagnostic::connection_failed(error))
}

/// Target path from `Content-Disposition`, for directory destinations only.
fn disposition_path(request: &DownloadRequest, header: Option<&str>) -> Option<PathBuf> {
    let dir = request.naming_dir()?;
    let name = parse_content_disposition(header?)?;
    Some(dir.join(sanitize_filename(&name)))
}

async fn existing_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

async fn open_output(path: &Path, append: bool) -> Result<File, DownloadError> {
    let mut options = OpenOptions::new();
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options
        .create(true)
        .open(path)
        .await
        .map_err(|e| DownloadError::local_storage(path, e))
}

/// Finishes a download whose bytes are all on disk.
async fn complete(
    request: &DownloadRequest,
    state: DownloadState,
    mime_type: Option<String>,
) -> DownloadResult {
    let attempts = state.attempt();
    let path = match corrected_path(request, state.path(), mime_type.as_deref()) {
        Some(target) => match tokio::fs::rename(state.path(), &target).await {
            Ok(()) => {
                debug!(
                    from = %state.path().display(),
                    to = %target.display(),
                    "replaced placeholder extension"
                );
                target
            }
            Err(e) => {
                let error = DownloadError::local_storage(state.path(), e);
                warn!(error = %error, "rename after download failed");
                return DownloadResult::failed(error, attempts);
            }
        },
        None => state.path().to_path_buf(),
    };

    info!(
        path = %path.display(),
        bytes = state.bytes_on_disk(),
        resumed = state.resumed(),
        attempts,
        "download complete"
    );
    DownloadResult::Completed {
        path,
        mime_type,
        bytes_on_disk: state.bytes_on_disk(),
        resumed: state.resumed(),
        attempts,
    }
}

/// New path for a guessed `.bin` name once the MIME type is known.
fn corrected_path(request: &DownloadRequest, path: &Path, mime_type: Option<&str>) -> Option<PathBuf> {
    if !request.guesses_name() || !has_placeholder_extension(path) {
        return None;
    }
    let extension = extension_for_mime(mime_type?)?;
    let name = replace_placeholder_extension(path, extension)?;
    Some(resolve_unique_path(path.parent()?, &name))
}
