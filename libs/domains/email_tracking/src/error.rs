//! Error types for the email tracking domain.
//!
//! Errors are categorized so the webhook worker knows whether a failed job
//! is worth another attempt:
//! - **Transient**: correlation races and store hiccups, retried with a fixed delay
//! - **Permanent**: configuration/coverage gaps and bad input, never retried

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type for email tracking operations.
pub type EmailResult<T> = Result<T, EmailError>;

/// Retry classification of an [`EmailError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
}

/// Errors that can occur in the email tracking domain.
#[derive(Debug, Error)]
pub enum EmailError {
    /// No adapter is registered under this provider name.
    #[error("Provider {0} is not supported")]
    UnsupportedProvider(String),

    /// A webhook carried an event token missing from the provider's table.
    #[error("Unknown event type '{0}'")]
    UnknownEventType(String),

    /// A provider payload did not have the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The send request itself is unusable (e.g. no primary recipient).
    #[error("Invalid send request: {0}")]
    InvalidRequest(String),

    /// No active recipient tracker carries this message id (yet).
    #[error("Recipient tracker not found for message id {0}")]
    TrackerNotFound(String),

    /// A tracker with this message id already exists.
    #[error("Duplicate message id {0}")]
    DuplicateMessageId(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Soft-deleting this row would orphan active children.
    #[error("{entity} {id} still has active {children}")]
    Protected {
        entity: &'static str,
        id: Uuid,
        children: &'static str,
    },

    /// Dispatch status only moves forward from `queued`.
    #[error("Email log {id} is already {status}")]
    InvalidTransition { id: Uuid, status: String },

    /// The webhook queue rejected a job.
    #[error("Webhook queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EmailError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EmailError::TrackerNotFound(_) | EmailError::Database(_) => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

impl From<DbErr> for EmailError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return EmailError::DuplicateMessageId(detail);
        }
        EmailError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::MalformedPayload(err.to_string())
    }
}

impl From<core_config::ConfigError> for EmailError {
    fn from(err: core_config::ConfigError) -> Self {
        EmailError::Config(err.to_string())
    }
}

impl IntoResponse for EmailError {
    fn into_response(self) -> Response {
        let status = match &self {
            EmailError::MalformedPayload(_) | EmailError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            EmailError::NotFound { .. } => StatusCode::NOT_FOUND,
            EmailError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
