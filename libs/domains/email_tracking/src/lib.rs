//! Email Tracking Domain
//!
//! Sends transactional email through pluggable providers, keeps an auditable
//! record of every send, and correlates provider delivery webhooks back to the
//! recipient they concern.
//!
//! # Architecture
//!
//! ```text
//!  send_email                               POST /{provider}/event/
//!      │                                            │
//! ┌────▼─────────┐                          ┌───────▼──────┐
//! │ EmailService │                          │   Handlers   │  ← raw body, 200 at once
//! └────┬─────────┘                          └───────┬──────┘
//!      │                                    ┌───────▼──────┐
//!      │                                    │ WebhookWorker│  ← fixed-delay retries, dead letters
//!      │                                    └───────┬──────┘
//!      │                                    ┌───────▼──────┐
//!      │                                    │ EventIngestor│
//!      │                                    └───────┬──────┘
//! ┌────▼────────────────────────────────────────────▼──────┐
//! │ ProviderRegistry → EmailProvider (mailjet, mock)        │
//! └────┬────────────────────────────────────────────────────┘
//! ┌────▼────────────────────────────────────────────────────┐
//! │ EmailRecordStore (in-memory, Postgres)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_email_tracking::{
//!     handlers, EmailService, EventIngestor, InMemoryEmailRecordStore, MailerConfig,
//!     MockEmailProvider, ProviderRegistry, SendEmailRequest, WebhookWorker,
//!     WebhookWorkerConfig,
//! };
//!
//! # async fn example() -> Result<(), domain_email_tracking::EmailError> {
//! let store = Arc::new(InMemoryEmailRecordStore::new());
//! let registry = Arc::new(ProviderRegistry::new().with_provider(Arc::new(MockEmailProvider::new())));
//!
//! let service = EmailService::new(
//!     Arc::clone(&store),
//!     Arc::clone(&registry),
//!     MailerConfig::new("noreply@example.com").with_provider("mock"),
//! );
//! let log = service
//!     .send_email(SendEmailRequest::new(vec!["a@example.com".into()], "Hello"))
//!     .await?;
//!
//! let (worker, queue) = WebhookWorker::new(
//!     EventIngestor::new(Arc::clone(&store), registry),
//!     WebhookWorkerConfig::default(),
//! );
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! tokio::spawn(worker.run(shutdown_rx));
//! let router = handlers::router(queue, store);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod postgres;
pub mod providers;
pub mod registry;
pub mod repository;
pub mod service;
pub mod worker;

// Re-export commonly used types
pub use config::{MailerConfig, WebhookWorkerConfig};
pub use error::{EmailError, EmailResult, ErrorCategory};
pub use ingestion::EventIngestor;
pub use metrics::{init_metrics, render_metrics, WebhookMetrics};
pub use models::{
    CanonicalEvent, DeadLetter, DeadLetterReason, DispatchStatus, EmailLog, EmailLogFilter,
    EmailStatus, EventLog, EventType, NewDeadLetter, NewEmailLog, NewEventLog, ParsedRecipient,
    RecipientTracker, RecipientType, SendEmailRequest, SendOutcome, TrackerMutation,
};
pub use postgres::PgEmailRecordStore;
pub use providers::{
    EmailProvider, MailjetClient, MailjetConfig, MailjetProvider, MailjetTransport,
    MockEmailProvider, ProviderResponse, MAILJET_PROVIDER, MOCK_PROVIDER,
};
pub use registry::ProviderRegistry;
pub use repository::{EmailRecordStore, InMemoryEmailRecordStore};
pub use service::EmailService;
pub use worker::{JobProcessor, WebhookJob, WebhookQueue, WebhookWorker};
