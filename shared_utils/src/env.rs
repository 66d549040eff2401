use std::{fmt::Display, str::FromStr};

use crate::config::ConfigError;

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated the same as unset ones.
pub fn get_env_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

/// Reads an optional environment variable. `None` when unset or empty.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

/// Reads and parses an environment variable, falling back to `default` when unset.
pub fn parse_env_var_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = get_env_var_opt(name) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}
