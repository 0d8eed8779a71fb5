//! Configuration validation beyond the schema's own checks

use regex::Regex;
use url::Url;

use super::env::placeholder_pattern;
use super::error::{ConfigError, ValidationError, ValidationErrorKind};
use super::schema::LonghaulConfig;

/// Configuration validator with additional validation rules
pub struct ConfigValidator {
    /// Pattern for environment variable placeholders left in values
    placeholder: Regex,
    /// Azure region names (`eastus`, `westeurope`, ...)
    region: Regex,
}

impl ConfigValidator {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            placeholder: placeholder_pattern()?,
            region: Regex::new(r"^[a-z][a-z0-9]{2,31}$").map_err(|e| ConfigError::ParseError {
                path: "<region pattern>".to_string(),
                line: None,
                column: None,
                message: e.to_string(),
            })?,
        })
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &LonghaulConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_placeholders(config)?;
        self.validate_urls(config)?;
        self.validate_regions(config)?;

        Ok(())
    }

    /// Values built in code skip interpolation; a placeholder there is a bug
    fn validate_placeholders(&self, config: &LonghaulConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            if let Some(found) = self.placeholder.find(provider.api_key.expose_secret()) {
                return Err(ValidationError::new(
                    format!("providers[{}].api_key", i),
                    ValidationErrorKind::UnresolvedPlaceholder {
                        placeholder: found.as_str().to_string(),
                    },
                ));
            }
        }
        Ok(())
    }

    fn validate_urls(&self, config: &LonghaulConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            let Some(base_url) = &provider.base_url else {
                continue;
            };
            let path = format!("providers[{}].base_url", i);

            let parsed = Url::parse(base_url).map_err(|e| {
                ValidationError::new(
                    path.as_str(),
                    ValidationErrorKind::InvalidUrl {
                        message: e.to_string(),
                    },
                )
            })?;

            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ValidationError::new(
                    path,
                    ValidationErrorKind::InvalidUrl {
                        message: format!("unsupported scheme '{}'", parsed.scheme()),
                    },
                ));
            }

            if parsed.query().is_some() {
                return Err(ValidationError::invalid_format(
                    path,
                    "base_url must not carry a query string",
                ));
            }
        }
        Ok(())
    }

    fn validate_regions(&self, config: &LonghaulConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            if let Some(region) = &provider.region {
                if !self.region.is_match(region) {
                    return Err(ValidationError::invalid_format(
                        format!("providers[{}].region", i),
                        format!("'{}' is not a region name", region),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::providers::ProviderKind;

    fn validate(provider: ProviderConfig) -> Result<(), ValidationError> {
        ConfigValidator::new()
            .unwrap()
            .validate(&LonghaulConfig::with_providers(vec![provider]))
    }

    #[test]
    fn test_valid_base_url() {
        let provider = ProviderConfig::new("runway", ProviderKind::Runway, "key")
            .with_base_url("http://127.0.0.1:8080");
        assert!(validate(provider).is_ok());
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let provider = ProviderConfig::new("runway", ProviderKind::Runway, "key")
            .with_base_url("ftp://files.example.com");
        let err = validate(provider).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }

    #[test]
    fn test_unresolved_placeholder_rejected() {
        let provider = ProviderConfig::new("brave", ProviderKind::Brave, "${BRAVE_API_KEY}");
        let err = validate(provider).unwrap_err();
        assert_eq!(err.field_path, "providers[0].api_key");
    }

    #[test]
    fn test_region_format() {
        let ok = ProviderConfig::new("speech", ProviderKind::Azure, "key").with_region("eastus2");
        assert!(validate(ok).is_ok());

        let bad = ProviderConfig::new("speech", ProviderKind::Azure, "key").with_region("East US");
        assert!(validate(bad).is_err());
    }
}
