//! Default User-Agent for download requests.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/resumable-fetch";

/// Default User-Agent, sent when a request carries no override.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("rfetch/{version} (+{PROJECT_UA_URL})")
}
