//! HTTP client construction, auth headers, and status mapping.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::BatonError;

/// Build the client used for chat calls. Per-request deadlines are enforced
/// by the caller, so no client-wide timeout is set.
pub fn build_client() -> Result<reqwest::Client, BatonError> {
    Ok(reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .build()?)
}

/// Default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str, streaming: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if streaming {
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    }
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Map a non-success HTTP status to an error. `retry_after` is the raw
/// `Retry-After` header value, if any.
pub fn status_to_error(status: u16, body: &str, retry_after: Option<&str>) -> BatonError {
    match status {
        401 | 403 => BatonError::Authentication(error_message(body)),
        429 => BatonError::RateLimited {
            retry_after_ms: retry_after
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64)
                .or_else(|| extract_retry_after(body)),
        },
        _ => BatonError::api(status, error_message(body)),
    }
}

/// Prefer `error.message` from an OpenAI-style error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
