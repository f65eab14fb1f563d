//! Mailtrack API
//!
//! Wires the email tracking domain into a running process: configuration,
//! tracing, record store, provider registry, webhook worker and HTTP server.

use std::sync::Arc;

use axum::Router;
use core_config::database::DatabaseConfig;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_email_tracking::{
    handlers, init_metrics, EmailRecordStore, EventIngestor, InMemoryEmailRecordStore,
    MailjetClient, MailjetProvider, MockEmailProvider, PgEmailRecordStore, ProviderRegistry,
    WebhookWorker,
};
use eyre::WrapErr;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::sync::watch;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

pub mod config;
mod shutdown;

pub use config::Config;
use shutdown::shutdown_signal;

/// Load config, pick the record store and serve until a shutdown signal.
pub async fn run() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);
    init_metrics();

    let registry = Arc::new(build_registry(&config)?);

    match config.database.clone() {
        Some(database) => {
            let db = connect_database(&database).await?;
            serve(Arc::new(PgEmailRecordStore::new(db)), registry, config).await
        }
        None => {
            warn!("DATABASE_URL not set, records are kept in memory");
            serve(Arc::new(InMemoryEmailRecordStore::new()), registry, config).await
        }
    }
}

/// Register every provider the configuration enables.
///
/// Mailjet is registered when its credentials are present; the mock provider
/// only outside production. Fails when the default provider is missing.
pub fn build_registry(config: &Config) -> eyre::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    if let Some(mailjet) = &config.mailjet {
        registry.register(Arc::new(MailjetProvider::new(Arc::new(MailjetClient::new(
            mailjet.clone(),
        )))));
    }

    if config.environment.is_development() {
        registry.register(Arc::new(MockEmailProvider::new()));
    }

    let default_provider = &config.mailer.default_provider;
    if !registry.contains(default_provider) {
        eyre::bail!(
            "default provider '{}' is not configured (available: {:?})",
            default_provider,
            registry.names()
        );
    }

    info!(providers = ?registry.names(), default = %default_provider, "Provider registry ready");
    Ok(registry)
}

/// Connect to Postgres and apply pending migrations when enabled.
pub async fn connect_database(config: &DatabaseConfig) -> eyre::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options.max_connections(config.max_connections);

    let db = Database::connect(options)
        .await
        .wrap_err("PostgreSQL connection failed")?;

    if config.run_migrations {
        Migrator::up(&db, None)
            .await
            .wrap_err("Failed to run migrations")?;
        info!("Database migrations applied");
    }

    Ok(db)
}

/// Webhook, health, metrics and dead-letter routes with request tracing
pub fn app<S: EmailRecordStore + 'static>(
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    config: &Config,
) -> (Router, WebhookWorker<EventIngestor<S>>) {
    let (worker, queue) = WebhookWorker::new(
        EventIngestor::new(Arc::clone(&store), registry),
        config.worker.clone(),
    );

    let router = handlers::router(queue, store).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    (router, worker)
}

async fn serve<S: EmailRecordStore + 'static>(
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    config: Config,
) -> eyre::Result<()> {
    let (router, worker) = app(store, registry, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let listener = tokio::net::TcpListener::bind(config.server.address())
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.server.address()))?;
    info!("Server starting on {}", listener.local_addr()?);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Server error")?;

    info!("HTTP server stopped, draining webhook worker");
    let _ = shutdown_tx.send(true);
    worker_handle.await.wrap_err("Webhook worker panicked")?;

    info!("Mailtrack API shutdown complete");
    Ok(())
}
