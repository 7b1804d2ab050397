//! Download request: what to fetch and where to put it.

use std::path::{Path, PathBuf};

use url::Url;

use super::DownloadError;
use super::filename::{guess_filename, last_path_segment, sanitize_filename};

/// Where the downloaded bytes go.
///
/// Filename guessing is only expressible together with a directory, so a
/// request can never ask to guess a name for an explicit file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Write to exactly this path.
    File(PathBuf),
    /// Write into this directory under a name derived from the response or URL.
    Directory {
        /// Target directory.
        dir: PathBuf,
        /// Derive the name from the URL and expected MIME type, with a
        /// placeholder extension that is corrected once the real type is known.
        guess_name: bool,
        /// MIME type the caller expects, used only while guessing.
        expected_mime: Option<String>,
    },
}

/// Immutable description of a single download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    destination: Destination,
    user_agent: Option<String>,
}

impl DownloadRequest {
    /// Downloads `url` to the exact file `path`.
    pub fn to_file(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: Destination::File(path.into()),
            user_agent: None,
        }
    }

    /// Downloads `url` into `dir`, naming the file from the URL or the
    /// server's `Content-Disposition` header.
    pub fn to_dir(url: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: Destination::Directory {
                dir: dir.into(),
                guess_name: false,
                expected_mime: None,
            },
            user_agent: None,
        }
    }

    /// Downloads `url` into `dir` under a guessed name.
    ///
    /// `expected_mime` picks the extension up front; without it the name gets
    /// a placeholder extension that is replaced after the transfer when the
    /// response type is known.
    pub fn guessing_name(
        url: impl Into<String>,
        dir: impl Into<PathBuf>,
        expected_mime: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            destination: Destination::Directory {
                dir: dir.into(),
                guess_name: true,
                expected_mime,
            },
            user_agent: None,
        }
    }

    /// Overrides the User-Agent header sent with every request.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// The remote URL as given.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Where the file goes.
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// The User-Agent override, if any.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Whether the local name is guessed (and may get its extension corrected).
    #[must_use]
    pub fn guesses_name(&self) -> bool {
        matches!(
            self.destination,
            Destination::Directory {
                guess_name: true,
                ..
            }
        )
    }

    /// Directory the server may place a `Content-Disposition` name into.
    ///
    /// `None` for explicit file destinations.
    #[must_use]
    pub fn naming_dir(&self) -> Option<&Path> {
        match &self.destination {
            Destination::File(_) => None,
            Destination::Directory { dir, .. } => Some(dir),
        }
    }

    /// Parses and validates the URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for malformed URLs and for
    /// schemes other than `http`/`https`.
    pub fn parsed_url(&self) -> Result<Url, DownloadError> {
        let parsed = Url::parse(&self.url).map_err(|_| DownloadError::invalid_url(&self.url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(&self.url));
        }
        Ok(parsed)
    }

    /// The path decided from the request alone, before any response header is seen.
    #[must_use]
    pub fn initial_path(&self, url: &Url) -> PathBuf {
        match &self.destination {
            Destination::File(path) => path.clone(),
            Destination::Directory {
                dir,
                guess_name: true,
                expected_mime,
            } => dir.join(guess_filename(url, expected_mime.as_deref())),
            Destination::Directory {
                dir,
                guess_name: false,
                ..
            } => match last_path_segment(url) {
                Some(segment) => dir.join(sanitize_filename(&segment)),
                None => dir.join(guess_filename(url, None)),
            },
        }
    }
}
