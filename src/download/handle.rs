//! Background execution of a download with an event channel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::request::DownloadRequest;
use super::result::{DownloadEvent, DownloadResult};
use super::task::Downloader;
use super::DownloadError;

/// Caller's side of a download running on a tokio worker.
///
/// Events arrive in order: zero or more [`DownloadEvent::Progress`], then
/// exactly one [`DownloadEvent::Finished`]. Dropping the handle does not stop
/// the download; call [`cancel`](Self::cancel) for that.
#[derive(Debug)]
pub struct DownloadHandle {
    events: mpsc::UnboundedReceiver<DownloadEvent>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    finished: bool,
}

impl Downloader {
    /// Starts `request` on a new tokio task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "the handle is the only way to observe the result"]
    pub fn spawn(&self, request: DownloadRequest) -> DownloadHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let downloader = self.clone();
        let token = cancel.clone();

        let worker = tokio::spawn(async move {
            let progress_tx = tx.clone();
            let result = downloader
                .fetch(&request, &token, move |bytes| {
                    // Receiver gone means nobody is listening; keep downloading.
                    let _ = progress_tx.send(DownloadEvent::Progress(bytes));
                })
                .await;
            let _ = tx.send(DownloadEvent::Finished(result));
        });

        DownloadHandle {
            events,
            cancel,
            worker,
            finished: false,
        }
    }
}

impl DownloadHandle {
    /// Asks the download to stop before its next read.
    pub fn cancel(&self) {
        debug!("cancellation requested");
        self.cancel.cancel();
    }

    /// Token that cancels this download, e.g. for a signal handler.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the terminal event has been delivered.
    ///
    /// A worker that stops without sending a result produces a synthetic
    /// `Finished` carrying [`DownloadError::TaskAborted`].
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        if self.finished {
            return None;
        }

        if let Some(event) = self.events.recv().await {
            if matches!(event, DownloadEvent::Finished(_)) {
                self.finished = true;
            }
            return Some(event);
        }

        self.finished = true;
        let reason = match (&mut self.worker).await {
            Ok(()) => "worker exited without a result".to_string(),
            Err(e) if e.is_panic() => "worker panicked".to_string(),
            Err(e) => e.to_string(),
        };
        warn!(%reason, "download worker lost");
        Some(DownloadEvent::Finished(DownloadResult::failed(
            DownloadError::task_aborted(reason),
            1,
        )))
    }

    /// Drains events and returns the terminal result.
    pub async fn wait(mut self) -> DownloadResult {
        while let Some(event) = self.next_event().await {
            if let DownloadEvent::Finished(result) = event {
                return result;
            }
        }
        DownloadResult::failed(DownloadError::task_aborted("result already taken"), 1)
    }
}
