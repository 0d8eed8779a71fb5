//! HTTP layer shared by every provider client
//!
//! This module handles:
//! - Connection pooling and client management
//! - Request ID generation and correlation
//! - Status code and transport error mapping with retry hints

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::{map_http_error, parse_retry_after};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Type of provider call being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Submit work (billable)
    Start,
    /// Check a job's progress
    Poll,
    /// Cancel a job on the provider side
    Cancel,
    /// Fetch one page of a paginated result
    FetchPage,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Start => "start",
            CallKind::Poll => "poll",
            CallKind::Cancel => "cancel",
            CallKind::FetchPage => "fetch_page",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single provider HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Type of provider call
    pub call_kind: CallKind,

    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout
    pub timeout: Duration,

    /// Optional idempotency key, sent on start calls
    pub idempotency_key: Option<String>,

    /// Operation the request belongs to
    pub operation_id: Option<String>,

    /// Time the call is made, as seen by the caller's clock
    pub issued_at: DateTime<Utc>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            call_kind: CallKind::Start,
            request_id: Uuid::new_v4(),
            timeout: Duration::from_secs(30),
            idempotency_key: None,
            operation_id: None,
            issued_at: Utc::now(),
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new(call_kind: CallKind) -> Self {
        Self {
            call_kind,
            request_id: Uuid::new_v4(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Attach the owning operation for log correlation
    pub fn for_operation(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.issued_at = now;
        self
    }

    /// Operation id or "-" for log lines
    pub(crate) fn operation_label(&self) -> &str {
        self.operation_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options_defaults() {
        let options = RequestOptions::new(CallKind::Poll);
        assert_eq!(options.call_kind, CallKind::Poll);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(options.idempotency_key.is_none());
        assert_eq!(options.operation_label(), "-");
    }

    #[test]
    fn test_each_request_gets_fresh_id() {
        let a = RequestOptions::new(CallKind::Start);
        let b = RequestOptions::new(CallKind::Start);
        assert_ne!(a.request_id, b.request_id);
    }
}
