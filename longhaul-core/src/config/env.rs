//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::{Captures, Regex};
use std::env;

/// `${VAR}` or `${VAR:-fallback}`
const PLACEHOLDER: &str = r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}";

pub(crate) fn placeholder_pattern() -> Result<Regex, ConfigError> {
    Regex::new(PLACEHOLDER).map_err(|e| ConfigError::ParseError {
        path: "<placeholder pattern>".to_string(),
        line: None,
        column: None,
        message: e.to_string(),
    })
}

/// Interpolate environment variables in a configuration string
///
/// Unset variables without a fallback are an error; the first one found is
/// reported.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = placeholder_pattern()?;
    let mut missing: Option<String> = None;

    let result = pattern.replace_all(content, |cap: &Captures<'_>| {
        let name = &cap[1];
        match (lookup(name), cap.get(2)) {
            (Some(value), _) => value,
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}
