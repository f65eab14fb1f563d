//! Mailjet email provider
//!
//! Sends through the Mailjet v3.1 Send API and understands Mailjet's event
//! webhooks.

use async_trait::async_trait;
use core_config::{env_optional, env_or_default, env_required, ConfigError, FromEnv};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

use super::{message_id_string, utc_from_epoch, EmailProvider, ProviderResponse};
use crate::error::{EmailError, EmailResult};
use crate::models::{
    CanonicalEvent, EmailLog, EventType, ParsedRecipient, RecipientType, SendOutcome,
};

/// Registry key of the Mailjet adapter
pub const MAILJET_PROVIDER: &str = "mailjet";

const DEFAULT_API_URL: &str = "https://api.mailjet.com/v3.1";

/// Response arrays walked in this order when collecting recipients
const RECIPIENT_BLOCKS: [(&str, RecipientType); 3] = [
    ("To", RecipientType::To),
    ("Cc", RecipientType::Cc),
    ("Bcc", RecipientType::Bcc),
];

/// Mailjet API credentials
#[derive(Clone)]
pub struct MailjetConfig {
    pub api_key: String,
    pub secret_key: String,
    pub api_url: String,
}

impl MailjetConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// `None` when `MAILJET_API_KEY` is unset
    pub fn from_env_optional() -> Result<Option<Self>, ConfigError> {
        match env_optional("MAILJET_API_KEY") {
            Some(_) => Self::from_env().map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for MailjetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailjetConfig")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl FromEnv for MailjetConfig {
    /// - MAILJET_API_KEY, MAILJET_SECRET_KEY: required
    /// - MAILJET_API_URL: defaults to the public v3.1 endpoint
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env_required("MAILJET_API_KEY")?,
            secret_key: env_required("MAILJET_SECRET_KEY")?,
            api_url: env_or_default("MAILJET_API_URL", DEFAULT_API_URL),
        })
    }
}

/// Wire transport for the Send API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailjetTransport: Send + Sync {
    /// POST the payload to `/send`.
    ///
    /// Any HTTP response, success or not, is `Ok`; `Err` means no response.
    async fn send(&self, payload: &Value) -> EmailResult<ProviderResponse>;
}

/// reqwest-based Mailjet client, created once and shared
#[derive(Clone)]
pub struct MailjetClient {
    config: MailjetConfig,
    client: Client,
}

impl MailjetClient {
    pub fn new(config: MailjetConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn send_url(&self) -> String {
        format!("{}/send", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl MailjetTransport for MailjetClient {
    async fn send(&self, payload: &Value) -> EmailResult<ProviderResponse> {
        let response = self
            .client
            .post(self.send_url())
            .basic_auth(&self.config.api_key, Some(&self.config.secret_key))
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        // Error pages are not always JSON; keep them as text
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(ProviderResponse::new(status, body))
    }
}

/// Mailjet adapter
pub struct MailjetProvider {
    transport: Arc<dyn MailjetTransport>,
}

impl MailjetProvider {
    pub fn new(transport: Arc<dyn MailjetTransport>) -> Self {
        Self { transport }
    }

    /// Build the Send API payload for a log.
    ///
    /// Cc and Bcc appear only when non-empty, a template replaces the body, and
    /// extra fields are merged last so they can override anything above.
    pub fn build_payload(log: &EmailLog) -> Value {
        let addresses = |list: &[String]| -> Value {
            list.iter().map(|email| json!({ "Email": email })).collect()
        };

        let mut message = Map::new();
        message.insert(
            "From".into(),
            json!({
                "Email": log.from_address,
                "Name": log.from_name.as_deref().unwrap_or(log.from_address.as_str()),
            }),
        );
        message.insert("Subject".into(), json!(log.subject));
        message.insert("To".into(), addresses(&log.to_addresses));

        if !log.cc_addresses.is_empty() {
            message.insert("Cc".into(), addresses(&log.cc_addresses));
        }

        if !log.bcc_addresses.is_empty() {
            message.insert("Bcc".into(), addresses(&log.bcc_addresses));
        }

        if let Some(template_id) = &log.template_id {
            // Mailjet template ids are numeric; anything else is passed through
            let id = template_id
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| json!(template_id));
            message.insert("TemplateID".into(), id);
            message.insert("TemplateLanguage".into(), json!(true));
            message.insert(
                "Variables".into(),
                log.template_data.clone().unwrap_or_else(|| json!({})),
            );
        } else if let Some(body) = &log.body {
            message.insert("HTMLPart".into(), json!(body));
        }

        if let Some(reply_to) = &log.reply_to {
            message.insert("ReplyTo".into(), json!({ "Email": reply_to }));
        }

        if let Some(extra) = &log.extra {
            for (key, value) in extra {
                message.insert(key.clone(), value.clone());
            }
        }

        json!({ "Messages": [message] })
    }

    fn parse_recipients(body: &Value) -> Result<Vec<ParsedRecipient>, String> {
        let message = body
            .get("Messages")
            .and_then(|m| m.get(0))
            .ok_or("missing Messages[0]")?;

        if message.get("Status").and_then(Value::as_str) == Some("error") {
            return Err("message status is error".into());
        }

        let mut recipients = Vec::new();
        for (key, recipient_type) in RECIPIENT_BLOCKS {
            let Some(entries) = message.get(key).and_then(Value::as_array) else {
                continue;
            };

            for entry in entries {
                let email = entry
                    .get("Email")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("{key} entry without Email"))?;
                let message_id = entry
                    .get("MessageID")
                    .and_then(message_id_string)
                    .ok_or_else(|| format!("{key} entry without MessageID"))?;

                recipients.push(ParsedRecipient::new(recipient_type, email, message_id));
            }
        }

        Ok(recipients)
    }
}

#[async_trait]
impl EmailProvider for MailjetProvider {
    fn name(&self) -> &'static str {
        MAILJET_PROVIDER
    }

    async fn send(&self, log: &EmailLog) -> EmailResult<ProviderResponse> {
        let payload = Self::build_payload(log);

        debug!(
            email_log_id = %log.id,
            recipients = log.recipient_count(),
            template = log.template_id.is_some(),
            "Sending email via Mailjet"
        );

        match self.transport.send(&payload).await {
            Ok(response) => Ok(response),
            Err(EmailError::Transport(message)) => {
                Ok(ProviderResponse::transport_failure(message))
            }
            Err(err) => Err(err),
        }
    }

    fn parse_send_response(&self, response: &ProviderResponse) -> SendOutcome {
        if response.is_success() {
            match Self::parse_recipients(&response.body) {
                Ok(recipients) => return SendOutcome::Sent(recipients),
                Err(reason) => {
                    error!(
                        status = response.status,
                        reason = %reason,
                        "Mailjet: Unreadable send response"
                    );
                    return SendOutcome::Failed(json!({
                        "error": response.body,
                        "parse_error": reason,
                    }));
                }
            }
        }

        let error_info = json!({ "error": response.body });
        error!(
            status = response.status,
            errors = %error_info,
            "Mailjet: Could not send email"
        );
        SendOutcome::Failed(error_info)
    }

    fn parse_webhook_event(&self, raw: &Value) -> EmailResult<(String, CanonicalEvent)> {
        let message_id = raw
            .get("MessageID")
            .and_then(message_id_string)
            .ok_or_else(|| EmailError::MalformedPayload("Mailjet event without MessageID".into()))?;

        let token = raw
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| EmailError::MalformedPayload("Mailjet event without event".into()))?;

        let event_type = match token {
            "open" => EventType::Opened,
            "click" => EventType::Clicked,
            "spam" => EventType::Spammed,
            "sent" => EventType::Delivered,
            "bounce" if raw.get("hard_bounce").and_then(Value::as_bool) == Some(true) => {
                EventType::HardBounced
            }
            "bounce" => EventType::SoftBounced,
            other => return Err(EmailError::UnknownEventType(other.to_string())),
        };

        let event_at = raw
            .get("time")
            .ok_or_else(|| EmailError::MalformedPayload("Mailjet event without time".into()))
            .and_then(utc_from_epoch)?;

        Ok((
            message_id,
            CanonicalEvent {
                event_type,
                payload: raw.clone(),
                event_at,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEmailLog;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{basic_auth, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email_log() -> EmailLog {
        EmailLog::new_queued(NewEmailLog {
            provider: MAILJET_PROVIDER.into(),
            from_address: "noreply@example.com".into(),
            from_name: Some("Example".into()),
            to_addresses: vec!["a@x.com".into()],
            cc_addresses: vec!["b@x.com".into()],
            bcc_addresses: vec!["c@x.com".into()],
            subject: "Hello".into(),
            body: Some("<p>hi</p>".into()),
            template_id: None,
            template_data: None,
            reply_to: None,
            extra: None,
        })
    }

    fn provider_with(transport: MockMailjetTransport) -> MailjetProvider {
        MailjetProvider::new(Arc::new(transport))
    }

    fn unused_provider() -> MailjetProvider {
        provider_with(MockMailjetTransport::new())
    }

    #[test]
    fn test_build_payload_with_body() {
        let payload = MailjetProvider::build_payload(&email_log());

        assert_eq!(
            payload,
            json!({
                "Messages": [{
                    "From": {"Email": "noreply@example.com", "Name": "Example"},
                    "Subject": "Hello",
                    "To": [{"Email": "a@x.com"}],
                    "Cc": [{"Email": "b@x.com"}],
                    "Bcc": [{"Email": "c@x.com"}],
                    "HTMLPart": "<p>hi</p>",
                }]
            })
        );
    }

    #[test]
    fn test_build_payload_with_template() {
        let mut log = email_log();
        log.cc_addresses.clear();
        log.bcc_addresses.clear();
        log.from_name = None;
        log.template_id = Some("4242".into());
        log.template_data = Some(json!({"variable": "test_variable"}));

        let payload = MailjetProvider::build_payload(&log);

        assert_eq!(
            payload,
            json!({
                "Messages": [{
                    "From": {"Email": "noreply@example.com", "Name": "noreply@example.com"},
                    "Subject": "Hello",
                    "To": [{"Email": "a@x.com"}],
                    "TemplateID": 4242,
                    "TemplateLanguage": true,
                    "Variables": {"variable": "test_variable"},
                }]
            })
        );
    }

    #[test]
    fn test_build_payload_extra_overrides_generated_fields() {
        let mut log = email_log();
        log.reply_to = Some("support@example.com".into());
        let mut extra = Map::new();
        extra.insert("Subject".into(), json!("Overridden"));
        extra.insert("CustomID".into(), json!("campaign-7"));
        log.extra = Some(extra);

        let payload = MailjetProvider::build_payload(&log);
        let message = &payload["Messages"][0];

        assert_eq!(message["Subject"], "Overridden");
        assert_eq!(message["CustomID"], "campaign-7");
        assert_eq!(message["ReplyTo"], json!({"Email": "support@example.com"}));
    }

    #[test]
    fn test_parse_send_response_walks_to_cc_bcc() {
        let response = ProviderResponse::new(
            200,
            json!({
                "Messages": [{
                    "Status": "success",
                    "Bcc": [{"Email": "c@x.com", "MessageID": 459}],
                    "Cc": [{"Email": "b@x.com", "MessageID": 458}],
                    "To": [{"Email": "a@x.com", "MessageUUID": "123", "MessageID": 456}],
                }]
            }),
        );

        let outcome = unused_provider().parse_send_response(&response);

        assert_eq!(
            outcome,
            SendOutcome::Sent(vec![
                ParsedRecipient::new(RecipientType::To, "a@x.com", "456"),
                ParsedRecipient::new(RecipientType::Cc, "b@x.com", "458"),
                ParsedRecipient::new(RecipientType::Bcc, "c@x.com", "459"),
            ])
        );
    }

    #[test]
    fn test_parse_send_error_response() {
        let body = json!({
            "Messages": [{
                "Status": "error",
                "Errors": [{
                    "ErrorCode": "send-0010",
                    "StatusCode": 400,
                    "ErrorRelatedTo": "TemplateID",
                }],
            }]
        });
        let response = ProviderResponse::new(400, body.clone());

        let outcome = unused_provider().parse_send_response(&response);

        assert_eq!(outcome, SendOutcome::Failed(json!({ "error": body })));
    }

    #[test]
    fn test_parse_unreadable_success_is_failure() {
        let response = ProviderResponse::new(200, json!({"unexpected": true}));

        let SendOutcome::Failed(info) = unused_provider().parse_send_response(&response) else {
            panic!("expected failure");
        };
        assert_eq!(info["error"], json!({"unexpected": true}));
        assert!(info["parse_error"].is_string());
    }

    #[test]
    fn test_parse_webhook_event_mapping() {
        let provider = unused_provider();
        let cases = [
            (json!({"event": "open"}), EventType::Opened),
            (json!({"event": "click"}), EventType::Clicked),
            (json!({"event": "spam"}), EventType::Spammed),
            (json!({"event": "sent"}), EventType::Delivered),
            (json!({"event": "bounce", "hard_bounce": true}), EventType::HardBounced),
            (json!({"event": "bounce", "hard_bounce": false}), EventType::SoftBounced),
            (json!({"event": "bounce"}), EventType::SoftBounced),
        ];

        for (mut raw, expected) in cases {
            raw["MessageID"] = json!(19421777396190490_u64);
            raw["time"] = json!(1433103519);

            let (message_id, event) = provider.parse_webhook_event(&raw).unwrap();
            assert_eq!(message_id, "19421777396190490");
            assert_eq!(event.event_type, expected);
            assert_eq!(event.event_at, Utc.timestamp_opt(1433103519, 0).unwrap());
            assert_eq!(event.payload, raw);
        }
    }

    #[test]
    fn test_parse_webhook_event_is_deterministic() {
        let provider = unused_provider();
        let raw = json!({"event": "bounce", "hard_bounce": true, "MessageID": 99, "time": 1600000000});

        assert_eq!(
            provider.parse_webhook_event(&raw).unwrap(),
            provider.parse_webhook_event(&raw).unwrap()
        );
    }

    #[test]
    fn test_parse_webhook_event_unknown_token_fails() {
        let raw = json!({"event": "unsub", "MessageID": 1, "time": 1433103519});

        let err = unused_provider().parse_webhook_event(&raw).unwrap_err();
        assert!(matches!(err, EmailError::UnknownEventType(token) if token == "unsub"));
    }

    #[test]
    fn test_parse_webhook_event_missing_fields() {
        let provider = unused_provider();

        let err = provider
            .parse_webhook_event(&json!({"event": "open", "time": 1}))
            .unwrap_err();
        assert!(matches!(err, EmailError::MalformedPayload(_)));

        let err = provider
            .parse_webhook_event(&json!({"event": "open", "MessageID": 1}))
            .unwrap_err();
        assert!(matches!(err, EmailError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_send_uses_transport() {
        let mut transport = MockMailjetTransport::new();
        transport
            .expect_send()
            .withf(|payload| payload["Messages"][0]["Subject"] == "Hello")
            .times(1)
            .returning(|_| Ok(ProviderResponse::new(200, json!({"Messages": []}))));

        let response = provider_with(transport).send(&email_log()).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_send_turns_transport_error_into_failed_response() {
        let mut transport = MockMailjetTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(EmailError::Transport("connection refused".into())));

        let provider = provider_with(transport);
        let response = provider.send(&email_log()).await.unwrap();

        assert_eq!(response.status, 0);
        assert!(matches!(
            provider.parse_send_response(&response),
            SendOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_client_posts_with_basic_auth() {
        let server = MockServer::start().await;
        let payload = MailjetProvider::build_payload(&email_log());

        Mock::given(method("POST"))
            .and(path("/v3.1/send"))
            .and(basic_auth("key", "secret"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Messages": [{"Status": "success", "To": [{"Email": "a@x.com", "MessageID": 1}]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MailjetClient::new(
            MailjetConfig::new("key", "secret").with_api_url(format!("{}/v3.1", server.uri())),
        );
        let response = client.send(&payload).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body["Messages"][0]["To"][0]["MessageID"], 1);
    }

    #[tokio::test]
    async fn test_client_keeps_non_json_error_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = MailjetClient::new(MailjetConfig::new("key", "bad").with_api_url(server.uri()));
        let response = client.send(&json!({"Messages": []})).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.body, json!("Unauthorized"));
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("MAILJET_API_KEY", Some("key")),
                ("MAILJET_SECRET_KEY", Some("secret")),
                ("MAILJET_API_URL", None),
            ],
            || {
                let config = MailjetConfig::from_env_optional().unwrap().unwrap();
                assert_eq!(config.api_url, DEFAULT_API_URL);
                assert!(!format!("{config:?}").contains("\"secret\""));
            },
        );

        temp_env::with_var_unset("MAILJET_API_KEY", || {
            assert!(MailjetConfig::from_env_optional().unwrap().is_none());
        });

        temp_env::with_vars(
            [("MAILJET_API_KEY", Some("key")), ("MAILJET_SECRET_KEY", None)],
            || {
                assert!(MailjetConfig::from_env_optional().is_err());
            },
        );
    }
}
