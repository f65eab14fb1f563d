//! In-process provider for development and testing
//!
//! Accepts every send (or rejects every send in failing mode) without network
//! I/O. Its webhook events use the canonical event names directly:
//! `{"event": "opened", "message_id": "mock-1", "timestamp": 1600000000}`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{message_id_string, utc_from_epoch, EmailProvider, ProviderResponse};
use crate::error::{EmailError, EmailResult};
use crate::models::{CanonicalEvent, EmailLog, EventType, ParsedRecipient, RecipientType, SendOutcome};

/// Registry key of the mock adapter
pub const MOCK_PROVIDER: &str = "mock";

/// Mock provider that captures sent logs
#[derive(Clone, Default)]
pub struct MockEmailProvider {
    sent: Arc<Mutex<Vec<EmailLog>>>,
    next_id: Arc<AtomicU64>,
    failure_message: Option<String>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that rejects every send
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Logs accepted so far
    pub async fn sent_logs(&self) -> Vec<EmailLog> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    fn next_message_id(&self) -> String {
        format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    fn name(&self) -> &'static str {
        MOCK_PROVIDER
    }

    async fn send(&self, log: &EmailLog) -> EmailResult<ProviderResponse> {
        if let Some(message) = &self.failure_message {
            return Ok(ProviderResponse::new(500, json!({ "message": message })));
        }

        let block = |list: &[String]| -> Value {
            list.iter()
                .map(|email| json!({ "email": email, "message_id": self.next_message_id() }))
                .collect()
        };
        let body = json!({
            "to": block(&log.to_addresses),
            "cc": block(&log.cc_addresses),
            "bcc": block(&log.bcc_addresses),
        });

        self.sent.lock().await.push(log.clone());
        Ok(ProviderResponse::new(200, body))
    }

    fn parse_send_response(&self, response: &ProviderResponse) -> SendOutcome {
        if !response.is_success() {
            tracing::error!(status = response.status, "Mock provider: send failed");
            return SendOutcome::Failed(json!({ "error": response.body }));
        }

        let recipients = [
            ("to", RecipientType::To),
            ("cc", RecipientType::Cc),
            ("bcc", RecipientType::Bcc),
        ]
        .into_iter()
        .flat_map(|(key, recipient_type)| {
            response.body[key]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(move |entry| {
                    Some(ParsedRecipient::new(
                        recipient_type,
                        entry["email"].as_str()?,
                        message_id_string(&entry["message_id"])?,
                    ))
                })
        })
        .collect();

        SendOutcome::Sent(recipients)
    }

    fn parse_webhook_event(&self, raw: &Value) -> EmailResult<(String, CanonicalEvent)> {
        let message_id = message_id_string(&raw["message_id"])
            .ok_or_else(|| EmailError::MalformedPayload("mock event without message_id".into()))?;

        let token = raw["event"]
            .as_str()
            .ok_or_else(|| EmailError::MalformedPayload("mock event without event".into()))?;
        let event_type = EventType::from_str(token)
            .map_err(|_| EmailError::UnknownEventType(token.to_string()))?;

        Ok((
            message_id,
            CanonicalEvent {
                event_type,
                payload: raw.clone(),
                event_at: utc_from_epoch(&raw["timestamp"])?,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEmailLog;

    fn email_log() -> EmailLog {
        EmailLog::new_queued(NewEmailLog {
            provider: MOCK_PROVIDER.into(),
            from_address: "noreply@example.com".into(),
            from_name: None,
            to_addresses: vec!["a@x.com".into(), "b@x.com".into()],
            cc_addresses: vec![],
            bcc_addresses: vec!["c@x.com".into()],
            subject: "Test".into(),
            body: Some("Body".into()),
            template_id: None,
            template_data: None,
            reply_to: None,
            extra: None,
        })
    }

    #[tokio::test]
    async fn test_mock_provider_issues_sequential_ids() {
        let provider = MockEmailProvider::new();

        let response = provider.send(&email_log()).await.unwrap();
        let SendOutcome::Sent(recipients) = provider.parse_send_response(&response) else {
            panic!("expected sent outcome");
        };

        let ids: Vec<&str> = recipients.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(ids, vec!["mock-1", "mock-2", "mock-3"]);
        assert_eq!(recipients[2].recipient_type, RecipientType::Bcc);
        assert_eq!(provider.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_mock_provider_fails() {
        let provider = MockEmailProvider::failing("Simulated failure");

        let response = provider.send(&email_log()).await.unwrap();
        let outcome = provider.parse_send_response(&response);

        assert_eq!(
            outcome,
            SendOutcome::Failed(json!({ "error": { "message": "Simulated failure" } }))
        );
        assert!(provider.sent_logs().await.is_empty());
    }

    #[test]
    fn test_mock_provider_webhook_events() {
        let provider = MockEmailProvider::new();
        let raw = json!({"event": "hard_bounced", "message_id": "mock-1", "timestamp": 1600000000});

        let (message_id, event) = provider.parse_webhook_event(&raw).unwrap();
        assert_eq!(message_id, "mock-1");
        assert_eq!(event.event_type, EventType::HardBounced);

        let err = provider
            .parse_webhook_event(&json!({"event": "bounce", "message_id": "mock-1", "timestamp": 1}))
            .unwrap_err();
        assert!(matches!(err, EmailError::UnknownEventType(_)));
    }
}
