//! Filename extraction, sanitization, and path resolution for downloads.
//!
//! Covers the three places a download's name can come from: the
//! `Content-Disposition` header, the URL path, and the response MIME type
//! (used to replace a placeholder extension once the transfer finishes).

use std::path::{Component, Path, PathBuf};

use url::Url;

use super::constants::PLACEHOLDER_EXTENSION;

/// Characters replaced with `_` when a server-supplied name is made safe.
///
/// The space character is included so names survive shells and URLs unquoted.
const ILLEGAL_FILENAME_CHARS: &[char] = &[
    '/', '\n', '\r', '\t', '\0', '\u{c}', '`', '?', '*', '\\', '&', '<', '>', '|', '"', ':', ' ',
];

/// Name used when neither the URL nor the headers yield one.
const DEFAULT_GUESSED_STEM: &str = "downloadfile";

/// Parses a `Content-Disposition` header value and returns the suggested filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf; size=1234`
/// - `attachment; filename="unterminated.pdf` (missing closing quote)
/// - `attachment; filename*=UTF-8''example%20file.pdf` (RFC 5987, only when no
///   plain `filename=` token is present)
///
/// Quote and backslash characters are stripped from the result. Returns `None`
/// when no token is present or its value is empty.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = find_parameter(header, "filename=") {
        let value = header[pos + "filename=".len()..].trim_start();
        let raw = match value.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => &quoted[..end],
                None => until_semicolon(quoted),
            },
            None => until_semicolon(value),
        };
        let cleaned: String = raw.chars().filter(|c| !matches!(c, '"' | '\\')).collect();
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            return Some(cleaned.to_string());
        }
    }

    let pos = find_parameter(header, "filename*=")?;
    let value = until_semicolon(header[pos + "filename*=".len()..].trim_start());
    // Format: charset'language'encoded_value
    let encoded = value.split_once("''").map_or(value, |(_, rest)| rest);
    let decoded = urlencoding::decode(encoded.trim()).ok()?;
    let decoded = decoded.trim_matches('"').trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}

/// Case-insensitive search for a header parameter name.
fn find_parameter(header: &str, name: &str) -> Option<usize> {
    header.to_ascii_lowercase().find(name)
}

fn until_semicolon(value: &str) -> &str {
    value.split(';').next().unwrap_or("")
}

/// Sanitizes a filename for filesystem safety.
///
/// Every character of [`ILLEGAL_FILENAME_CHARS`] becomes `_`. Names that
/// would resolve to `.` or `..` have their dots replaced as well.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if ILLEGAL_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Maps a MIME type onto the fixed extension table.
///
/// Parameters (`; charset=...`) are ignored and matching is case-insensitive.
/// Returns `None` for types outside the table.
#[must_use]
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "text/html" => Some(".html"),
        "text/plain" => Some(".txt"),
        "application/pdf" => Some(".pdf"),
        "application/zip" => Some(".zip"),
        "audio/mpeg" => Some(".mp3"),
        "image/png" => Some(".png"),
        "image/jpeg" => Some(".jpg"),
        "image/gif" => Some(".gif"),
        "video/mp4" => Some(".mp4"),
        "video/mpeg" => Some(".mpeg"),
        _ => None,
    }
}

/// Guesses a local filename from the URL's last path segment.
///
/// A segment without an extension gets one from `expected_mime` when the
/// table knows it, otherwise [`PLACEHOLDER_EXTENSION`]. A URL without a usable
/// segment yields `downloadfile` plus that extension.
#[must_use]
pub fn guess_filename(url: &Url, expected_mime: Option<&str>) -> String {
    let extension = expected_mime
        .and_then(extension_for_mime)
        .unwrap_or(PLACEHOLDER_EXTENSION);

    let Some(segment) = last_path_segment(url) else {
        return format!("{DEFAULT_GUESSED_STEM}{extension}");
    };

    let name = sanitize_filename(&segment);
    if has_extension(&name) {
        name
    } else {
        format!("{name}{extension}")
    }
}

/// The URL's last path segment, percent-decoded, when non-empty.
#[must_use]
pub fn last_path_segment(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn has_extension(name: &str) -> bool {
    name.rfind('.')
        .is_some_and(|pos| pos > 0 && pos + 1 < name.len())
}

/// Returns whether `path` carries the placeholder extension.
#[must_use]
pub fn has_placeholder_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(PLACEHOLDER_EXTENSION))
}

/// Replaces the placeholder extension of `path`'s filename with `extension`.
#[must_use]
pub fn replace_placeholder_extension(path: &Path, extension: &str) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if !has_placeholder_extension(path) {
        return None;
    }
    let stem = name.get(..name.len() - PLACEHOLDER_EXTENSION.len())?;
    Some(format!("{stem}{extension}"))
}

/// Resolves a unique file path, adding a numeric suffix if the file exists.
///
/// Example: `file.pdf`, then `file_1.pdf`, `file_2.pdf`, ...
#[must_use]
pub fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.trim_matches('_').is_empty() {
            format!("{DEFAULT_GUESSED_STEM}{PLACEHOLDER_EXTENSION}")
        } else {
            sanitized
        }
    };
    let base_path = dir.join(&filename);

    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for i in 1..1000 {
        let new_path = dir.join(format!("{stem}_{i}{ext}"));
        if !new_path.exists() {
            return new_path;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}
