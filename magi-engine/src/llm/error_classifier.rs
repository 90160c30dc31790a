//! Maps failed backend calls onto [`ProviderError`]

use magi_core::ProviderError;
use serde_json::Value;

/// Raw error bodies are cut to this many characters
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Classify a non-2xx response.
///
/// The message is taken from the first of: `error.message`, a top-level
/// `message`, the body itself when it is a JSON string or not JSON at all
/// (first 200 characters), and finally `API error: {status}`.
pub fn classify_status(provider: &str, status: u16, body: &str) -> ProviderError {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(json) => message_from_json(&json),
        Err(_) => non_empty(body).map(|raw| truncate_chars(raw, MAX_ERROR_BODY_CHARS)),
    }
    .unwrap_or_else(|| format!("API error: {}", status));

    ProviderError::with_status(provider, status, message)
}

fn message_from_json(json: &Value) -> Option<String> {
    if let Some(message) = json.pointer("/error/message").and_then(Value::as_str).and_then(non_empty) {
        return Some(message.to_string());
    }
    if let Some(message) = json.get("message").and_then(Value::as_str).and_then(non_empty) {
        return Some(message.to_string());
    }
    json.as_str()
        .and_then(non_empty)
        .map(|raw| truncate_chars(raw, MAX_ERROR_BODY_CHARS))
}

/// Transport failure after the retry budget was spent. The request URL is
/// dropped from the message.
pub fn transport_exhausted(provider: &str, err: reqwest::Error) -> ProviderError {
    let err = err.without_url();
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("network error: {}", err)
    };
    ProviderError::new(provider, message)
}

/// 2xx response whose body could not be decoded
pub fn malformed_body(provider: &str, status: u16, err: &serde_json::Error) -> ProviderError {
    ProviderError::with_status(provider, status, format!("invalid response body: {}", err))
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn non_empty(text: &str) -> Option<&str> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
