//! Environment-driven configuration shared by the mailtrack services.
//!
//! Every config struct implements [`FromEnv`]; the helpers below keep the
//! lookup/parse/error boilerplate in one place.

pub mod database;
pub mod server;
pub mod tracing;

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application environment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Reads `APP_ENV`; anything other than "production" is development.
    pub fn from_env() -> Self {
        let app_env = env_or_default("APP_ENV", "development");

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Value of `key`, or `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Value of `key`, or [`ConfigError::MissingEnvVar`]
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Value of `key` if set and non-empty
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse `key` into `T`, falling back to `default` when unset.
///
/// A value that is set but does not parse is an error rather than a silent
/// fallback.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });

        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_env_or_default() {
        temp_env::with_var("MAILTRACK_TEST_VAR", Some("value"), || {
            assert_eq!(env_or_default("MAILTRACK_TEST_VAR", "fallback"), "value");
        });

        temp_env::with_var_unset("MAILTRACK_TEST_VAR", || {
            assert_eq!(env_or_default("MAILTRACK_TEST_VAR", "fallback"), "fallback");
        });
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("MAILTRACK_REQUIRED", || {
            let err = env_required("MAILTRACK_REQUIRED").unwrap_err();
            assert!(err.to_string().contains("MAILTRACK_REQUIRED"));
            assert!(err.to_string().contains("required"));
        });
    }

    #[test]
    fn test_env_optional_ignores_blank() {
        temp_env::with_var("MAILTRACK_OPTIONAL", Some("   "), || {
            assert_eq!(env_optional("MAILTRACK_OPTIONAL"), None);
        });

        temp_env::with_var("MAILTRACK_OPTIONAL", Some("set"), || {
            assert_eq!(env_optional("MAILTRACK_OPTIONAL").as_deref(), Some("set"));
        });
    }

    #[test]
    fn test_env_parse() {
        temp_env::with_var_unset("MAILTRACK_ATTEMPTS", || {
            assert_eq!(env_parse::<u32>("MAILTRACK_ATTEMPTS", 5).unwrap(), 5);
        });

        temp_env::with_var("MAILTRACK_ATTEMPTS", Some(" 7 "), || {
            assert_eq!(env_parse::<u32>("MAILTRACK_ATTEMPTS", 5).unwrap(), 7);
        });

        temp_env::with_var("MAILTRACK_ATTEMPTS", Some("many"), || {
            let err = env_parse::<u32>("MAILTRACK_ATTEMPTS", 5).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "MAILTRACK_ATTEMPTS"));
        });
    }
}
