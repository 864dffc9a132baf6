//! Input Sanitization - Untrusted Text In, SanitizedPrompt Out
//!
//! Prompt pipeline (order is part of the contract):
//! strip_control -> collapse_whitespace -> redact_blocklist -> truncate

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Hard byte caps for user-controlled strings.
pub const MAX_PROMPT_BYTES: usize = 8000;
pub const MAX_FILENAME_BYTES: usize = 256;
pub const MAX_URL_BYTES: usize = 2048;

/// Redaction terms. Each term scans the text already masked by the terms
/// before it, so the order decides which overlapping match survives.
pub const BLOCKLIST: [&str; 7] = [
    "nsfw", "nude", "nudity", "porn", "explicit", "sexual", "erotic",
];

const REDACTION_MASK: char = '*';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("Invalid input: {0} is empty")]
    InvalidInput(&'static str),

    #[error("Sanitization exhausted: {0} reduced to empty")]
    SanitizationExhausted(&'static str),

    #[error("URL exceeds {} bytes", MAX_URL_BYTES)]
    UrlTooLong,

    #[error("Unsupported URL scheme (expected http or https)")]
    UnsupportedUrlScheme,
}

/// Prompt text that went through [`sanitize`]: non-empty, printable ASCII
/// plus tab/newline only, at most [`MAX_PROMPT_BYTES`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SanitizedPrompt(String);

impl SanitizedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Lowercased copy used as classifier input.
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl AsRef<str> for SanitizedPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitize a prompt given as text.
pub fn sanitize(raw: &str) -> Result<SanitizedPrompt, SanitizeError> {
    sanitize_bytes(raw.as_bytes())
}

/// Sanitize a prompt given as raw, possibly non-UTF-8, bytes.
pub fn sanitize_bytes(raw: &[u8]) -> Result<SanitizedPrompt, SanitizeError> {
    if raw.is_empty() {
        return Err(SanitizeError::InvalidInput("prompt"));
    }

    let stripped = strip_control(raw);
    let collapsed = collapse_whitespace(&stripped);
    if collapsed.is_empty() {
        return Err(SanitizeError::SanitizationExhausted("prompt"));
    }

    let (mut redacted, redactions) = redact_counting(&collapsed);
    if redacted.is_empty() {
        return Err(SanitizeError::SanitizationExhausted("prompt"));
    }
    truncate(&mut redacted, MAX_PROMPT_BYTES);

    debug!(
        raw_bytes = raw.len(),
        sanitized_bytes = redacted.len(),
        redactions,
        "prompt sanitized"
    );

    Ok(SanitizedPrompt(redacted))
}

/// Keep printable ASCII (32..=126) plus tab and newline; drop every other byte.
pub fn strip_control(raw: &[u8]) -> String {
    raw.iter()
        .copied()
        .filter(|&b| matches!(b, b' '..=b'~' | b'\t' | b'\n'))
        .map(char::from)
        .collect()
}

/// Collapse every run of space/tab/CR/LF into one space and drop a trailing space.
///
/// Leading whitespace still collapses to a single space; only the tail is trimmed.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\r' | '\n') {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Mask every blocklisted term with `*`, preserving length and position.
pub fn redact_blocklist(text: &str) -> String {
    redact_counting(text).0
}

fn redact_counting(text: &str) -> (String, usize) {
    let mut out = text.to_string();
    let mut lower = text.to_ascii_lowercase();
    let mut hits = 0;

    for term in BLOCKLIST {
        let mask: String = std::iter::repeat(REDACTION_MASK).take(term.len()).collect();
        let mut pos = 0;
        while let Some(found) = lower[pos..].find(term) {
            let start = pos + found;
            let end = start + term.len();
            out.replace_range(start..end, &mask);
            lower.replace_range(start..end, &mask);
            hits += 1;
            pos = end;
        }
    }

    (out, hits)
}

/// Cut `text` to at most `max_bytes` bytes.
///
/// Sanitized text is ASCII, so the cut lands exactly on `max_bytes`.
pub fn truncate(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Enforce a safe ASCII filename without path separators or quotes.
pub fn sanitize_filename(name: &str) -> Result<String, SanitizeError> {
    let mut raw = name.trim().to_string();
    if raw.is_empty() {
        return Err(SanitizeError::InvalidInput("filename"));
    }
    truncate(&mut raw, MAX_FILENAME_BYTES);

    let cleaned: String = raw
        .chars()
        .filter(|&c| !matches!(c, '/' | '\\' | ':' | '"' | '\'' | '`'))
        .filter(|c| (' '..='~').contains(c))
        .collect();

    let out = cleaned.trim();
    if out.is_empty() {
        return Err(SanitizeError::SanitizationExhausted("filename"));
    }
    Ok(out.to_string())
}

/// Enforce an http(s) reference-image URL under [`MAX_URL_BYTES`].
pub fn sanitize_image_url(url: &str) -> Result<String, SanitizeError> {
    let raw = url.trim();
    if raw.is_empty() {
        return Err(SanitizeError::InvalidInput("url"));
    }
    if raw.len() > MAX_URL_BYTES {
        return Err(SanitizeError::UrlTooLong);
    }

    let spaced: String = raw
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if (c as u32) < 0x20 || c == '\u{7f}' => None,
            c => Some(c),
        })
        .collect();
    let cleaned = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let lower = cleaned.to_ascii_lowercase();
    if !lower.starts_with("https://") && !lower.starts_with("http://") {
        return Err(SanitizeError::UnsupportedUrlScheme);
    }
    Ok(cleaned)
}
