//! Configuration schema structures with serde support

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::providers::{ProviderKind, RetryPolicy};

/// Supported schema version
pub const SCHEMA_VERSION: &str = "0.1";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LonghaulConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Provider accounts
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Operation timing shared by all providers
    #[serde(default)]
    pub durability: DurabilityConfig,

    /// Global connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// One provider account
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique name, used in logs
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Override of the provider's public endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Service region, required by Azure unless `base_url` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Delay between polls of a pending job; falls back to
    /// `durability.default_poll_interval_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Per-call timeout; falls back to `connection.request_timeout_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    /// Minimal enabled account with defaults for everything else
    pub fn new(name: impl Into<String>, kind: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            name: name.into(),
            kind,
            api_key: api_key.into(),
            base_url: None,
            region: None,
            retry_policy: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            poll_interval_ms: None,
            request_timeout_ms: None,
            enabled: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Configured base URL without a trailing slash, or the given default
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.name", path)));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if self.kind == ProviderKind::Azure && self.region.is_none() && self.base_url.is_none() {
            return Err(ValidationError::required(format!("{}.region", path))
                .with_context("azure needs a region or an explicit base_url"));
        }

        if self.poll_interval_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.poll_interval_ms", path),
                "must be greater than zero",
            ));
        }

        if self.request_timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.request_timeout_ms", path),
                "must be greater than zero",
            ));
        }

        if self.rate_limit.max_concurrent == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.rate_limit.max_concurrent", path),
                "must be greater than zero",
            ));
        }

        self.retry_policy
            .validate()
            .map_err(|message| ValidationError::out_of_range(format!("{}.retry_policy", path), message))
    }
}

/// Local rate limiting
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Concurrent calls allowed against this account
    #[serde(default)]
    pub max_concurrent: Option<u32>,
}

/// Operation lifecycle timing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DurabilityConfig {
    /// Delay between polls of a pending job
    #[serde(default = "default_poll_interval")]
    pub default_poll_interval_ms: u64,

    /// Keep operations this long before garbage collection; defaults to the
    /// provider's own retention window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_secs: Option<u64>,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            default_poll_interval_ms: default_poll_interval(),
            retention_secs: None,
        }
    }
}

impl DurabilityConfig {
    pub fn default_poll_interval(&self) -> Duration {
        Duration::from_millis(self.default_poll_interval_ms)
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    /// Largest response body accepted
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    5_000
}
fn default_connect_timeout() -> u64 {
    10_000
}
fn default_request_timeout() -> u64 {
    60_000
}
fn default_max_idle() -> usize {
    10
}
fn default_max_response_bytes() -> usize {
    64 * 1024 * 1024
}

impl LonghaulConfig {
    /// Configuration with the given providers and default everything else
    pub fn with_providers(providers: Vec<ProviderConfig>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            providers,
            durability: DurabilityConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }

    /// Enabled account for a provider kind
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.enabled && p.kind == kind)
    }

    /// Poll interval for an account, falling back to the global default
    pub fn poll_interval(&self, provider: &ProviderConfig) -> Duration {
        provider
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.durability.default_poll_interval())
    }

    /// Per-call timeout for an account, falling back to the connection default
    pub fn request_timeout(&self, provider: &ProviderConfig) -> Duration {
        Duration::from_millis(
            provider
                .request_timeout_ms
                .unwrap_or(self.connection.request_timeout_ms),
        )
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != SCHEMA_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be configured"));
        }

        let mut seen_names = HashSet::new();
        let mut enabled_kinds = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            let path = format!("providers[{}]", i);

            if !seen_names.insert(provider.name.as_str()) {
                return Err(ValidationError::new(
                    format!("{}.name", path),
                    ValidationErrorKind::DuplicateValue {
                        value: provider.name.clone(),
                    },
                ));
            }

            // the engine keeps one client per kind
            if provider.enabled && !enabled_kinds.insert(provider.kind) {
                return Err(ValidationError::incompatible(
                    format!("{}.type", path),
                    format!("more than one enabled {} provider", provider.kind),
                ));
            }

            provider.validate(&path)?;
        }

        if self.durability.default_poll_interval_ms == 0 {
            return Err(ValidationError::out_of_range(
                "durability.default_poll_interval_ms",
                "must be greater than zero",
            ));
        }

        if self.connection.request_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                "connection.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(providers: Vec<ProviderConfig>) -> LonghaulConfig {
        LonghaulConfig::with_providers(providers)
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let cfg = config(vec![ProviderConfig::new("runway", ProviderKind::Runway, "key_123")]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.poll_interval(&cfg.providers[0]), Duration::from_secs(5));
    }

    #[test]
    fn test_wrong_version() {
        let mut cfg = config(vec![ProviderConfig::new("runway", ProviderKind::Runway, "k")]);
        cfg.version = "2.0".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::InvalidVersion { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let cfg = config(vec![
            ProviderConfig::new("search", ProviderKind::Brave, "a"),
            ProviderConfig::new("search", ProviderKind::Tavily, "b"),
        ]);
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field_path, "providers[1].name");
    }

    #[test]
    fn test_two_enabled_accounts_of_one_kind_rejected() {
        let mut standby = ProviderConfig::new("brave-b", ProviderKind::Brave, "b");
        let cfg = config(vec![
            ProviderConfig::new("brave-a", ProviderKind::Brave, "a"),
            standby.clone(),
        ]);
        assert!(cfg.validate().is_err());

        standby.enabled = false;
        let cfg = config(vec![ProviderConfig::new("brave-a", ProviderKind::Brave, "a"), standby]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.provider(ProviderKind::Brave).unwrap().name, "brave-a");
    }

    #[test]
    fn test_azure_requires_region() {
        let cfg = config(vec![ProviderConfig::new("speech", ProviderKind::Azure, "k")]);
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field_path, "providers[0].region");

        let cfg = config(vec![
            ProviderConfig::new("speech", ProviderKind::Azure, "k").with_region("westeurope")
        ]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = ProviderConfig::new("t", ProviderKind::Tavily, "k")
            .with_base_url("http://localhost:9000/");
        assert_eq!(provider.base_url_or("https://api.tavily.com"), "http://localhost:9000");
    }
}
