use crate::{env_optional, env_parse, ConfigError, FromEnv};

/// Postgres connection settings
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            run_migrations: true,
        }
    }

    /// Like [`FromEnv::from_env`] but yields `None` when `DATABASE_URL` is unset.
    pub fn from_env_optional() -> Result<Option<Self>, ConfigError> {
        match env_optional("DATABASE_URL") {
            Some(url) => Ok(Some(Self {
                url,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 20)?,
                run_migrations: env_parse("DATABASE_RUN_MIGRATIONS", true)?,
            })),
            None => Ok(None),
        }
    }
}

impl FromEnv for DatabaseConfig {
    /// Requires DATABASE_URL to be set
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_optional()?
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}
