use core_config::database::DatabaseConfig;
use core_config::server::ServerConfig;
use core_config::{Environment, FromEnv};
use domain_email_tracking::{MailerConfig, MailjetConfig, WebhookWorkerConfig};

/// Application configuration
/// Composes the shared config components with the email tracking settings
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    /// `None` selects the in-memory record store
    pub database: Option<DatabaseConfig>,
    pub mailer: MailerConfig,
    /// `None` when Mailjet credentials are not configured
    pub mailjet: Option<MailjetConfig>,
    pub worker: WebhookWorkerConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = DatabaseConfig::from_env_optional()?;

        if environment.is_production() && database.is_none() {
            eyre::bail!("DATABASE_URL is required in production");
        }

        Ok(Self {
            environment,
            server: ServerConfig::from_env()?, // Uses defaults: HOST=0.0.0.0, PORT=8080
            database,
            mailer: MailerConfig::from_env()?, // Requires EMAIL_DEFAULT_FROM_ADDRESS
            mailjet: MailjetConfig::from_env_optional()?,
            worker: WebhookWorkerConfig::from_env()?,
        })
    }
}
