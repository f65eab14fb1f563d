use core_config::{env_optional, env_or_default, env_parse, env_required, ConfigError, FromEnv};
use std::time::Duration;

use crate::providers::mailjet::MAILJET_PROVIDER;

/// Sender defaults applied to send requests that leave them unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailerConfig {
    pub default_from_address: String,
    pub default_from_name: Option<String>,
    pub default_provider: String,
}

impl MailerConfig {
    pub fn new(default_from_address: impl Into<String>) -> Self {
        Self {
            default_from_address: default_from_address.into(),
            default_from_name: None,
            default_provider: MAILJET_PROVIDER.to_string(),
        }
    }

    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.default_from_name = Some(name.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = provider.into();
        self
    }
}

impl FromEnv for MailerConfig {
    /// - EMAIL_DEFAULT_FROM_ADDRESS: required
    /// - EMAIL_DEFAULT_FROM_NAME: optional
    /// - EMAIL_DEFAULT_PROVIDER: defaults to "mailjet"
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            default_from_address: env_required("EMAIL_DEFAULT_FROM_ADDRESS")?,
            default_from_name: env_optional("EMAIL_DEFAULT_FROM_NAME"),
            default_provider: env_or_default("EMAIL_DEFAULT_PROVIDER", MAILJET_PROVIDER),
        })
    }
}

/// Webhook worker tuning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookWorkerConfig {
    /// Re-runs after a transient failure; a job executes at most
    /// `max_retries + 1` times
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub retry_delay: Duration,
    pub max_concurrent_jobs: usize,
    pub queue_capacity: usize,
}

impl Default for WebhookWorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(60),
            max_concurrent_jobs: 8,
            queue_capacity: 1024,
        }
    }
}

impl WebhookWorkerConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

impl FromEnv for WebhookWorkerConfig {
    /// - WEBHOOK_MAX_RETRIES: defaults to 5
    /// - WEBHOOK_RETRY_DELAY_SECS: defaults to 60
    /// - WEBHOOK_MAX_CONCURRENT_JOBS: defaults to 8
    /// - WEBHOOK_QUEUE_CAPACITY: defaults to 1024
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self::default()
            .with_max_retries(env_parse("WEBHOOK_MAX_RETRIES", defaults.max_retries)?)
            .with_retry_delay(Duration::from_secs(env_parse(
                "WEBHOOK_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )?))
            .with_max_concurrent_jobs(env_parse(
                "WEBHOOK_MAX_CONCURRENT_JOBS",
                defaults.max_concurrent_jobs,
            )?)
            .with_queue_capacity(env_parse("WEBHOOK_QUEUE_CAPACITY", defaults.queue_capacity)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailer_config_requires_from_address() {
        temp_env::with_var_unset("EMAIL_DEFAULT_FROM_ADDRESS", || {
            let err = MailerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("EMAIL_DEFAULT_FROM_ADDRESS"));
        });
    }

    #[test]
    fn test_mailer_config_defaults_provider() {
        temp_env::with_vars(
            [
                ("EMAIL_DEFAULT_FROM_ADDRESS", Some("noreply@example.com")),
                ("EMAIL_DEFAULT_FROM_NAME", Some("  ")),
                ("EMAIL_DEFAULT_PROVIDER", None),
            ],
            || {
                let config = MailerConfig::from_env().unwrap();
                assert_eq!(config.default_from_address, "noreply@example.com");
                assert_eq!(config.default_from_name, None);
                assert_eq!(config.default_provider, "mailjet");
            },
        );
    }

    #[test]
    fn test_worker_config_from_env() {
        temp_env::with_vars(
            [
                ("WEBHOOK_MAX_RETRIES", Some("3")),
                ("WEBHOOK_RETRY_DELAY_SECS", Some("5")),
                ("WEBHOOK_MAX_CONCURRENT_JOBS", None),
                ("WEBHOOK_QUEUE_CAPACITY", Some("0")),
            ],
            || {
                let config = WebhookWorkerConfig::from_env().unwrap();
                assert_eq!(config.max_retries, 3);
                assert_eq!(config.retry_delay, Duration::from_secs(5));
                assert_eq!(config.max_concurrent_jobs, 8);
                assert_eq!(config.queue_capacity, 1);
            },
        );
    }

    #[test]
    fn test_worker_config_default_retries_five_times() {
        temp_env::with_vars_unset(
            ["WEBHOOK_MAX_RETRIES", "WEBHOOK_RETRY_DELAY_SECS"],
            || {
                let config = WebhookWorkerConfig::from_env().unwrap();
                assert_eq!(config.max_retries, 5);
                assert_eq!(config.retry_delay, Duration::from_secs(60));
            },
        );
    }

    #[test]
    fn test_worker_config_rejects_garbage() {
        temp_env::with_var("WEBHOOK_MAX_RETRIES", Some("many"), || {
            assert!(WebhookWorkerConfig::from_env().is_err());
        });
    }
}
