//! Terminal result and progress events of a download.

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use super::DownloadError;

/// Problem/remedy pair reported for a download that did not complete.
#[derive(Debug, Serialize)]
pub struct Diagnostic {
    /// What went wrong, in plain language.
    pub problem: String,
    /// What the user can do about it.
    pub remedy: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Underlying cause, absent for cancellation.
    #[serde(serialize_with = "serialize_cause")]
    pub cause: Option<DownloadError>,
}

impl Diagnostic {
    /// Builds the diagnostic for a failed download.
    #[must_use]
    pub fn from_error(error: DownloadError, attempts: u32) -> Self {
        Self {
            problem: error.problem(attempts),
            remedy: error.remedy().to_string(),
            attempts,
            cause: Some(error),
        }
    }

    /// Builds the diagnostic for a transient failure that used up every attempt.
    ///
    /// The text is the same whatever the last error was.
    #[must_use]
    pub fn retries_exhausted(error: DownloadError, attempts: u32) -> Self {
        Self {
            problem: format!("Download failed after {attempts} tries."),
            remedy: "A better download URL or network conditions.".to_string(),
            attempts,
            cause: Some(error),
        }
    }

    /// Builds the diagnostic for a first connection that failed transiently.
    ///
    /// Such failures are not retried, so no attempt count is reported.
    #[must_use]
    pub fn connection_failed(error: DownloadError) -> Self {
        Self {
            problem: "There is no network connection.".to_string(),
            remedy: "A good connection to the network is required.".to_string(),
            attempts: 1,
            cause: Some(error),
        }
    }

    /// Builds the diagnostic for a cancelled download.
    #[must_use]
    pub fn cancelled(attempts: u32) -> Self {
        Self {
            problem: "Download cancelled.".to_string(),
            remedy: "None required.".to_string(),
            attempts,
            cause: None,
        }
    }
}

#[allow(clippy::ref_option)]
fn serialize_cause<S: Serializer>(
    cause: &Option<DownloadError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match cause {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// The single terminal outcome of a download.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadResult {
    /// All bytes are on disk.
    Completed {
        /// Final file path, after any server rename or extension fix.
        path: PathBuf,
        /// `Content-Type` of the response, when the server sent one.
        mime_type: Option<String>,
        /// Size of the finished file.
        bytes_on_disk: u64,
        /// Whether an earlier partial file was continued.
        resumed: bool,
        /// Attempts used.
        attempts: u32,
    },
    /// Stopped on request; the partial file is left in place.
    Cancelled {
        /// Path of the partial file.
        path: PathBuf,
        /// Bytes written before stopping.
        bytes_on_disk: u64,
        /// Always the "no remedy needed" diagnostic.
        diagnostic: Diagnostic,
    },
    /// Gave up.
    Failed(Diagnostic),
}

impl DownloadResult {
    /// Wraps an error into a failed result.
    #[must_use]
    pub fn failed(error: DownloadError, attempts: u32) -> Self {
        Self::Failed(Diagnostic::from_error(error, attempts))
    }

    /// Whether the file was downloaded completely.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Whether the download was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The local file path, when one was produced.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Completed { path, .. } | Self::Cancelled { path, .. } => Some(path),
            Self::Failed(_) => None,
        }
    }

    /// MIME type reported by the server for a completed download.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Completed { mime_type, .. } => mime_type.as_deref(),
            _ => None,
        }
    }

    /// Problem/remedy details for cancelled and failed downloads.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Completed { .. } => None,
            Self::Cancelled { diagnostic, .. } | Self::Failed(diagnostic) => Some(diagnostic),
        }
    }

    /// Attempts used to reach this outcome.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } => *attempts,
            Self::Cancelled { diagnostic, .. } | Self::Failed(diagnostic) => diagnostic.attempts,
        }
    }
}

/// Notification delivered to the caller of a background download.
#[derive(Debug)]
pub enum DownloadEvent {
    /// Bytes on disk so far; never decreases.
    Progress(u64),
    /// The terminal result, always the last event.
    Finished(DownloadResult),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_carries_problem_and_remedy() {
        let result = DownloadResult::failed(DownloadError::invalid_url("nope"), 1);
        assert!(!result.is_success());
        let diagnostic = result.diagnostic().unwrap();
        assert_eq!(diagnostic.problem, "This is an invalid URL (link).");
        assert_eq!(diagnostic.remedy, "A valid URL (link) is required.");
        assert!(matches!(
            diagnostic.cause,
            Some(DownloadError::InvalidUrl { .. })
        ));
        assert!(result.path().is_none());
    }

    #[test]
    fn test_cancelled_is_not_success_and_has_no_cause() {
        let result = DownloadResult::Cancelled {
            path: PathBuf::from("/tmp/part.bin"),
            bytes_on_disk: 10,
            diagnostic: Diagnostic::cancelled(1),
        };
        assert!(!result.is_success());
        assert!(result.is_cancelled());
        let diagnostic = result.diagnostic().unwrap();
        assert_eq!(diagnostic.problem, "Download cancelled.");
        assert_eq!(diagnostic.remedy, "None required.");
        assert!(diagnostic.cause.is_none());
        assert_eq!(result.path(), Some(Path::new("/tmp/part.bin")));
    }

    #[test]
    fn test_retries_exhausted_ignores_error_category() {
        let diagnostic =
            Diagnostic::retries_exhausted(DownloadError::http_status("https://x.test/a", 503), 5);
        assert_eq!(diagnostic.problem, "Download failed after 5 tries.");
        assert_eq!(
            diagnostic.remedy,
            "A better download URL or network conditions."
        );
        assert_eq!(diagnostic.attempts, 5);
    }

    #[test]
    fn test_connection_failed_reports_network_problem() {
        let diagnostic = Diagnostic::connection_failed(DownloadError::timeout("https://x.test/a"));
        assert_eq!(diagnostic.problem, "There is no network connection.");
        assert_eq!(
            diagnostic.remedy,
            "A good connection to the network is required."
        );
        assert_eq!(diagnostic.attempts, 1);
    }

    #[test]
    fn test_completed_serializes_with_status_tag() {
        let result = DownloadResult::Completed {
            path: PathBuf::from("/tmp/a.png"),
            mime_type: Some("image/png".to_string()),
            bytes_on_disk: 3,
            resumed: false,
            attempts: 1,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["mime_type"], "image/png");
        assert_eq!(json["bytes_on_disk"], 3);
    }

    #[test]
    fn test_failed_serializes_cause_as_text() {
        let result = DownloadResult::failed(DownloadError::not_found("https://x.test/a", 404), 1);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["problem"], "The link (URL) is broken or missing.");
        assert!(json["cause"].as_str().unwrap().contains("404"));
    }
}
