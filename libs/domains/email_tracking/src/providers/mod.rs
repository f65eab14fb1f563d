//! Email provider adapters
//!
//! An adapter turns an [`EmailLog`] into a provider wire call, normalizes the
//! provider's response into a [`SendOutcome`], and parses the provider's
//! webhook events into [`CanonicalEvent`]s.

pub mod mailjet;
pub mod mock;

pub use mailjet::{MailjetClient, MailjetConfig, MailjetProvider, MailjetTransport, MAILJET_PROVIDER};
pub use mock::{MockEmailProvider, MOCK_PROVIDER};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{EmailError, EmailResult};
use crate::models::{CanonicalEvent, EmailLog, SendOutcome};

/// Raw transport result of a send call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// HTTP status code, or 0 when the request never got a response
    pub status: u16,
    pub body: Value,
}

impl ProviderResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Synthetic response for a request that failed below HTTP
    pub fn transport_failure(error: impl std::fmt::Display) -> Self {
        Self {
            status: 0,
            body: Value::String(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for email providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Registry key, e.g. "mailjet"
    fn name(&self) -> &'static str;

    /// Send the log's email and return the unprocessed provider response.
    ///
    /// Transport failures come back as a failed [`ProviderResponse`] so they are
    /// recorded on the log; only local errors (such as an unserializable
    /// payload) are returned as `Err`.
    async fn send(&self, log: &EmailLog) -> EmailResult<ProviderResponse>;

    /// Normalize a send response into per-recipient records or an error payload
    fn parse_send_response(&self, response: &ProviderResponse) -> SendOutcome;

    /// Parse one native webhook event into `(message_id, event)`
    fn parse_webhook_event(&self, raw: &Value) -> EmailResult<(String, CanonicalEvent)>;
}

/// Canonical string form of a provider message id (numbers or strings)
pub(crate) fn message_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// UTC timestamp from epoch seconds
pub(crate) fn utc_from_epoch(value: &Value) -> EmailResult<DateTime<Utc>> {
    let seconds = value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| EmailError::MalformedPayload(format!("invalid epoch timestamp {value}")))?;

    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| EmailError::MalformedPayload(format!("timestamp {seconds} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_message_id_string_forms() {
        assert_eq!(message_id_string(&json!(1152921504)), Some("1152921504".into()));
        assert_eq!(message_id_string(&json!("abc")), Some("abc".into()));
        assert_eq!(message_id_string(&json!("")), None);
        assert_eq!(message_id_string(&json!(null)), None);
    }

    #[test]
    fn test_utc_from_epoch() {
        let expected = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        assert_eq!(utc_from_epoch(&json!(1_600_000_000)).unwrap(), expected);
        assert_eq!(utc_from_epoch(&json!("1600000000")).unwrap(), expected);
        assert!(utc_from_epoch(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_transport_failure_response() {
        let response = ProviderResponse::transport_failure("connection refused");
        assert_eq!(response.status, 0);
        assert!(!response.is_success());
        assert!(ProviderResponse::new(201, json!({})).is_success());
    }
}
