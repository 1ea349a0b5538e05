//! Environment-variable helpers used when building service configs.

use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Required variable; missing is a configuration error.
pub fn must_var(name: &str) -> Result<String, AppError> {
    env::var(name)
        .map_err(|_| AppError::config(format!("Required environment variable '{name}' is not set")))
}

/// Optional variable with a default.
pub fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Optional variable; empty values count as unset.
pub fn opt_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Optional typed variable with a default; unparsable values are errors.
pub fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match opt_var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("{name}='{raw}' is invalid: {e}"))),
    }
}
