//! Secret handling for provider credentials
//!
//! API keys are wrapped in [`SecretString`], whose `Debug` and `Display`
//! never print the value. Anything that shows up in logs goes through
//! [`SafeLogging`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::ProviderConfig;

/// A wrapper type for sensitive strings like API keys
#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (only for building request headers)
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Partially redacted form: enough to tell two keys apart
    pub fn partial_redact(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        match chars.len() {
            0 => "[EMPTY]".to_string(),
            1..=8 => "[REDACTED]".to_string(),
            len => {
                let tail: String = chars[len - 4..].iter().collect();
                // keep well-known key prefixes such as "key_" or "tvly-"
                let prefix: String = self
                    .value
                    .find(['_', '-'])
                    .filter(|&i| i > 0 && i <= 5)
                    .map(|i| self.value[..=i].to_string())
                    .unwrap_or_default();
                format!("{}...{}", prefix, tail)
            }
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A trait for types that can be logged safely
pub trait SafeLogging {
    fn safe_for_logging(&self) -> String;
}

impl SafeLogging for ProviderConfig {
    fn safe_for_logging(&self) -> String {
        format!(
            "{} ({}, key {}, base_url {}, enabled {})",
            self.name,
            self.kind,
            self.api_key.partial_redact(),
            self.base_url.as_deref().unwrap_or("default"),
            self.enabled
        )
    }
}
