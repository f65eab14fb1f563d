use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MailerConfig;
use crate::error::{EmailError, EmailResult};
use crate::models::{
    EmailLog, EmailLogFilter, NewEmailLog, RecipientTracker, SendEmailRequest, SendOutcome,
};
use crate::registry::ProviderRegistry;
use crate::repository::EmailRecordStore;

/// Dispatch service: log, send, record the outcome.
///
/// A send is a single attempt. Provider rejections and transport failures end
/// as a `failed` log rather than an error; only unusable requests (unknown
/// provider, no recipients) and store failures are returned as `Err`.
pub struct EmailService<S: EmailRecordStore> {
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    defaults: MailerConfig,
}

impl<S: EmailRecordStore> Clone for EmailService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            defaults: self.defaults.clone(),
        }
    }
}

impl<S: EmailRecordStore> EmailService<S> {
    pub fn new(store: Arc<S>, registry: Arc<ProviderRegistry>, defaults: MailerConfig) -> Self {
        Self {
            store,
            registry,
            defaults,
        }
    }

    /// Send one email and return its log in a terminal dispatch status
    pub async fn send_email(&self, request: SendEmailRequest) -> EmailResult<EmailLog> {
        let provider_name = request
            .provider
            .clone()
            .unwrap_or_else(|| self.defaults.default_provider.clone());
        let provider = self.registry.resolve(&provider_name)?;

        if request.to.is_empty() {
            return Err(EmailError::InvalidRequest(
                "at least one primary recipient is required".into(),
            ));
        }

        let log = self
            .store
            .create_email_log(self.resolve_request(provider.name(), request))
            .await?;

        let outcome = match provider.send(&log).await {
            Ok(response) => provider.parse_send_response(&response),
            Err(err) => {
                warn!(email_log_id = %log.id, error = %err, "Provider could not build send request");
                SendOutcome::Failed(json!({ "error": err.to_string() }))
            }
        };

        match outcome {
            SendOutcome::Sent(recipients) => {
                let log = self.store.mark_email_log_sent(log.id).await?;
                let trackers = self
                    .store
                    .create_recipient_trackers(log.id, recipients)
                    .await?;

                info!(
                    email_log_id = %log.id,
                    provider = %log.provider,
                    recipients = trackers.len(),
                    "Email sent"
                );
                Ok(log)
            }
            SendOutcome::Failed(error_info) => {
                let log = self.store.mark_email_log_failed(log.id, error_info).await?;

                info!(email_log_id = %log.id, provider = %log.provider, "Email failed");
                Ok(log)
            }
        }
    }

    pub async fn get_email_log(&self, id: Uuid) -> EmailResult<EmailLog> {
        self.store
            .get_email_log(id)
            .await?
            .ok_or(EmailError::NotFound {
                entity: "email log",
                id,
            })
    }

    pub async fn list_email_logs(&self, filter: EmailLogFilter) -> EmailResult<Vec<EmailLog>> {
        self.store.list_email_logs(filter).await
    }

    /// Active trackers of a log
    pub async fn trackers_for(&self, email_log_id: Uuid) -> EmailResult<Vec<RecipientTracker>> {
        self.store.list_trackers_for_log(email_log_id, false).await
    }

    fn resolve_request(&self, provider: &str, request: SendEmailRequest) -> NewEmailLog {
        let (from_address, from_name) = match request.from_address {
            Some(address) => (address, request.from_name),
            None => (
                self.defaults.default_from_address.clone(),
                request
                    .from_name
                    .or_else(|| self.defaults.default_from_name.clone()),
            ),
        };

        NewEmailLog {
            provider: provider.to_string(),
            from_address,
            from_name,
            to_addresses: request.to,
            cc_addresses: request.cc,
            bcc_addresses: request.bcc,
            subject: request.subject,
            body: request.body,
            template_id: request.template_id,
            template_data: request.template_data,
            reply_to: request.reply_to,
            extra: request.extra,
        }
    }
}
