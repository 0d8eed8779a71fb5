//! Configuration loading and validation
//!
//! Provider accounts, operation timing and connection settings are read
//! from YAML or JSON. `${VAR}` placeholders are resolved from the
//! environment before parsing, so API keys never need to live in the file.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ConnectionConfig, DurabilityConfig, LonghaulConfig, ProviderConfig, RateLimitConfig,
    SCHEMA_VERSION,
};
pub use secrets::{SafeLogging, SecretString};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<LonghaulConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_yaml(&content, &path.to_string_lossy())
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<LonghaulConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_json(&content, &path.to_string_lossy())
}

/// Load a configuration, picking the format from the file extension
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<LonghaulConfig> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => load_from_yaml(path),
        "json" => load_from_json(path),
        _ => Err(ConfigError::UnsupportedFormat { extension }),
    }
}

/// Parse and validate YAML text; `origin` names the source in errors
pub fn parse_yaml(content: &str, origin: &str) -> ConfigResult<LonghaulConfig> {
    let interpolated = interpolate_env_vars(content)?;

    let config: LonghaulConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new()?.validate(&config)?;
    Ok(config)
}

/// Parse and validate JSON text; `origin` names the source in errors
pub fn parse_json(content: &str, origin: &str) -> ConfigResult<LonghaulConfig> {
    let interpolated = interpolate_env_vars(content)?;

    let config: LonghaulConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new()?.validate(&config)?;
    Ok(config)
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}
