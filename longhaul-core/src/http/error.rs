//! HTTP error mapping utilities

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::providers::ClientError;

/// Map a non-success status and body to a [`ClientError`]
///
/// Provider clients handle the codes that mean something specific to them
/// and fall back to this for the rest.
pub fn map_http_error(
    status: StatusCode,
    headers: Option<&HeaderMap>,
    body: Option<&str>,
    request_id: Uuid,
) -> ClientError {
    let message = format!(
        "{} [request_id: {}]",
        error_message(status, body),
        request_id
    );

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication,

        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimit {
            retry_after: headers.and_then(retry_after_from_headers),
        },

        StatusCode::NOT_FOUND => ClientError::NotFound { message },

        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ClientError::Timeout,

        status if status.is_server_error() => ClientError::ServerError {
            status_code: status.as_u16(),
            message,
        },

        status if status.is_client_error() => ClientError::InvalidRequest { message },

        _ => ClientError::Custom {
            code: format!("HTTP_{}", status.as_u16()),
            message,
        },
    }
}

/// Map a transport failure from reqwest
pub fn map_transport_error(err: &reqwest::Error, request_id: Uuid) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else if err.is_connect() {
        ClientError::Network {
            message: format!("Connection failed: {} [request_id: {}]", err, request_id),
        }
    } else if err.is_decode() {
        ClientError::parse(format!("{} [request_id: {}]", err, request_id))
    } else {
        ClientError::Network {
            message: format!("{} [request_id: {}]", err, request_id),
        }
    }
}

/// Best human-readable message from an error body
pub fn error_message(status: StatusCode, body: Option<&str>) -> String {
    body.and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_message(&v))
        .or_else(|| body.filter(|b| !b.trim().is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()))
}

fn extract_message(json: &Value) -> Option<String> {
    // { "error": { "message": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    // { "error": "..." } and { "detail": { "error": "..." } }
    if let Some(message) = json.get("error").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = json
        .get("detail")
        .and_then(|d| d.get("error"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    // { "errors": ["...", ...] }
    if let Some(errors) = json.get("errors").and_then(Value::as_array) {
        let joined: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
        if !joined.is_empty() {
            return Some(joined.join("; "));
        }
    }

    for key in ["message", "err_msg", "detail"] {
        if let Some(message) = json.get(key).and_then(Value::as_str) {
            return Some(message.to_string());
        }
    }

    None
}

/// Extract a Retry-After hint from response headers
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

/// Parse a Retry-After value given as delta seconds or an HTTP date
pub fn parse_retry_after(header_value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = header_value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    (at - now).to_std().ok().or(Some(Duration::ZERO))
}
