//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{ChattrError, Collaborator};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// Per-request timeouts are set at the call site; the pool is shared by every
/// outbound collaborator.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?;
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Pop every complete line out of `buffer`, leaving any partial tail behind.
///
/// Lines are decoded only once complete, so a multibyte character split
/// across network chunks survives.
pub fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        if !line.is_empty() && !line.starts_with(':') {
            lines.push(line);
        }
    }
    lines
}

/// Turn a non-success HTTP status into an upstream error for `collaborator`.
pub fn status_to_error(collaborator: Collaborator, status: u16, body: &str) -> ChattrError {
    let message = match status {
        401 | 403 => format!("HTTP {status}: authentication rejected"),
        429 => format!("HTTP {status}: rate limited"),
        _ => format!("HTTP {status}: {}", truncate(body, 512)),
    };
    ChattrError::upstream_message(collaborator, message)
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
