//! Provider call error types and classification

use std::time::Duration;
use thiserror::Error;

use crate::http::CallKind;

/// Result type for provider client calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by a [`crate::providers::ProviderClient`] call
///
/// Each client maps provider status codes and bodies onto these variants;
/// [`ClientError::is_transient`] then decides whether the state machine may
/// retry the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Rate limit exceeded, retry after the given duration if known
    #[error("Rate limit exceeded{}", retry_suffix(.retry_after))]
    RateLimit { retry_after: Option<Duration> },

    /// Request timed out before a response arrived
    #[error("Request timeout")]
    Timeout,

    /// Temporary server error (5xx)
    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    /// Connection level failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request the provider will never accept (4xx)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Credentials rejected
    #[error("Authentication failed")]
    Authentication,

    /// Account quota or plan limit reached
    #[error("Quota exhausted: {message}")]
    QuotaExhausted { message: String },

    /// Job or resource unknown to the provider
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Response body did not match the expected shape
    #[error("Failed to parse response: {message}")]
    Parse { message: String },

    /// The client does not implement this call
    #[error("{call} is not supported by {provider}")]
    Unsupported {
        provider: &'static str,
        call: CallKind,
    },

    /// Provider-specific error
    #[error("Error [{code}]: {message}")]
    Custom { code: String, message: String },
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(duration) => format!(", retry after {:?}", duration),
        None => String::new(),
    }
}

impl ClientError {
    /// Whether a later identical call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Timeout => true,
            Self::ServerError { .. } => true,
            Self::Network { .. } => true,
            Self::InvalidRequest { .. } => false,
            Self::Authentication => false,
            Self::QuotaExhausted { .. } => false,
            Self::NotFound { .. } => false,
            Self::Parse { .. } => false,
            Self::Unsupported { .. } => false,
            Self::Custom { .. } => false,
        }
    }

    /// Provider-supplied delay hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::RateLimit { retry_after: None }.is_transient());
        assert!(ClientError::Timeout.is_transient());
        assert!(ClientError::ServerError {
            status_code: 503,
            message: "overloaded".to_string()
        }
        .is_transient());

        assert!(!ClientError::Authentication.is_transient());
        assert!(!ClientError::invalid("bad seed").is_transient());
        assert!(!ClientError::QuotaExhausted {
            message: "plan limit".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_rate_limit_display() {
        let err = ClientError::RateLimit {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded, retry after 2s");
        assert_eq!(
            ClientError::RateLimit { retry_after: None }.to_string(),
            "Rate limit exceeded"
        );
    }

    #[test]
    fn test_unsupported_display() {
        let err = ClientError::Unsupported {
            provider: "deepgram",
            call: CallKind::Poll,
        };
        assert_eq!(err.to_string(), "poll is not supported by deepgram");
    }
}
