//! Vocabulary and data model for email dispatch and delivery tracking.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

// ============================================================================
// Vocabulary
// ============================================================================

/// Lifecycle of an outbound send attempt.
///
/// Starts at `Queued` and moves exactly once to `Sent` or `Failed`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchStatus {
    #[default]
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Role of a recipient on an email.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecipientType {
    #[sea_orm(string_value = "to")]
    To,
    #[sea_orm(string_value = "cc")]
    Cc,
    #[sea_orm(string_value = "bcc")]
    Bcc,
}

/// Per-recipient delivery outcome.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailStatus {
    #[default]
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "spammed")]
    Spammed,
    #[sea_orm(string_value = "soft_bounced")]
    SoftBounced,
    #[sea_orm(string_value = "hard_bounced")]
    HardBounced,
}

/// Canonical delivery event type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "opened")]
    Opened,
    #[sea_orm(string_value = "clicked")]
    Clicked,
    #[sea_orm(string_value = "spammed")]
    Spammed,
    #[sea_orm(string_value = "soft_bounced")]
    SoftBounced,
    #[sea_orm(string_value = "hard_bounced")]
    HardBounced,
}

/// Change applied to a recipient tracker when an event is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerMutation {
    IncrementOpens,
    IncrementClicks,
    SetStatus(EmailStatus),
}

impl EventType {
    /// Mutation rule for this event type.
    ///
    /// `Spammed` is recorded in the event log but leaves the tracker untouched.
    pub fn tracker_mutation(&self) -> Option<TrackerMutation> {
        match self {
            EventType::Opened => Some(TrackerMutation::IncrementOpens),
            EventType::Clicked => Some(TrackerMutation::IncrementClicks),
            EventType::Delivered => Some(TrackerMutation::SetStatus(EmailStatus::Delivered)),
            EventType::SoftBounced => Some(TrackerMutation::SetStatus(EmailStatus::SoftBounced)),
            EventType::HardBounced => Some(TrackerMutation::SetStatus(EmailStatus::HardBounced)),
            EventType::Spammed => None,
        }
    }
}

/// Why a webhook job ended up in the dead-letter store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeadLetterReason {
    /// Every retry failed with a transient error
    #[sea_orm(string_value = "retries_exhausted")]
    RetriesExhausted,
    #[sea_orm(string_value = "permanent_error")]
    PermanentError,
    /// The worker stopped before the job could run again
    #[sea_orm(string_value = "shutdown")]
    Shutdown,
}

// ============================================================================
// Send contract
// ============================================================================

/// Outbound send request as supplied by a caller.
///
/// Sender and provider fall back to the configured defaults when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub to: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub body: Option<String>,
    pub template_id: Option<String>,
    pub template_data: Option<Value>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub provider: Option<String>,
    pub reply_to: Option<String>,
    /// Provider-specific fields merged verbatim into the wire payload.
    pub extra: Option<serde_json::Map<String, Value>>,
}

impl SendEmailRequest {
    pub fn new(to: Vec<String>, subject: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>, data: Value) -> Self {
        self.template_id = Some(template_id.into());
        self.template_data = Some(data);
        self
    }

    pub fn with_sender(mut self, address: impl Into<String>, name: Option<String>) -> Self {
        self.from_address = Some(address.into());
        self.from_name = name;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Map<String, Value>) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Fully resolved input for a new email log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmailLog {
    pub provider: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub subject: String,
    pub body: Option<String>,
    pub template_id: Option<String>,
    pub template_data: Option<Value>,
    pub reply_to: Option<String>,
    pub extra: Option<serde_json::Map<String, Value>>,
}

// ============================================================================
// Persisted records
// ============================================================================

/// One outbound send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: Uuid,
    pub provider: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub subject: String,
    pub body: Option<String>,
    pub template_id: Option<String>,
    pub template_data: Option<Value>,
    pub dispatch_status: DispatchStatus,
    pub error_info: Option<Value>,
    pub reply_to: Option<String>,
    pub extra: Option<serde_json::Map<String, Value>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailLog {
    /// New row in `queued` status.
    pub fn new_queued(input: NewEmailLog) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            provider: input.provider,
            from_address: input.from_address,
            from_name: input.from_name,
            to_addresses: input.to_addresses,
            cc_addresses: input.cc_addresses,
            bcc_addresses: input.bcc_addresses,
            subject: input.subject,
            body: input.body,
            template_id: input.template_id,
            template_data: input.template_data,
            dispatch_status: DispatchStatus::Queued,
            error_info: None,
            reply_to: input.reply_to,
            extra: input.extra,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total recipients across to, cc and bcc.
    pub fn recipient_count(&self) -> usize {
        self.to_addresses.len() + self.cc_addresses.len() + self.bcc_addresses.len()
    }
}

/// One recipient of one email log, keyed by the provider message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientTracker {
    pub id: Uuid,
    pub email_log_id: Uuid,
    pub recipient_type: RecipientType,
    pub email_address: String,
    pub message_id: String,
    pub open_count: u32,
    pub click_count: u32,
    pub email_status: EmailStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipientTracker {
    pub fn new(email_log_id: Uuid, recipient: ParsedRecipient) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email_log_id,
            recipient_type: recipient.recipient_type,
            email_address: recipient.email_address,
            message_id: recipient.message_id,
            open_count: 0,
            click_count: 0,
            email_status: EmailStatus::Queued,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One delivery occurrence for one tracker. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub id: Uuid,
    pub tracker_id: Uuid,
    pub event_type: EventType,
    pub payload: Value,
    pub event_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new event log row: a canonical event bound to its tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEventLog {
    pub tracker_id: Uuid,
    pub event_type: EventType,
    pub payload: Value,
    pub event_at: DateTime<Utc>,
}

impl EventLog {
    pub fn new(input: NewEventLog) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            tracker_id: input.tracker_id,
            event_type: input.event_type,
            payload: input.payload,
            event_at: input.event_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A webhook job the worker gave up on, kept for inspection and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: Uuid,
    pub job_id: Uuid,
    pub provider: String,
    /// Raw event text as received
    pub payload: String,
    pub error: String,
    pub reason: DeadLetterReason,
    /// Attempts actually made
    pub attempts: u32,
    pub received_at: DateTime<Utc>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeadLetter {
    pub job_id: Uuid,
    pub provider: String,
    pub payload: String,
    pub error: String,
    pub reason: DeadLetterReason,
    pub attempts: u32,
    pub received_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(input: NewDeadLetter) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_id: input.job_id,
            provider: input.provider,
            payload: input.payload,
            error: input.error,
            reason: input.reason,
            attempts: input.attempts,
            received_at: input.received_at,
            failed_at: Utc::now(),
        }
    }
}

// ============================================================================
// Canonical provider output
// ============================================================================

/// Recipient record extracted from a successful send response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecipient {
    pub recipient_type: RecipientType,
    pub email_address: String,
    pub message_id: String,
}

impl ParsedRecipient {
    pub fn new(
        recipient_type: RecipientType,
        email_address: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            recipient_type,
            email_address: email_address.into(),
            message_id: message_id.into(),
        }
    }
}

/// Normalized result of a provider send call.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Accepted; one record per recipient in to, cc, bcc order.
    Sent(Vec<ParsedRecipient>),
    /// Rejected; structured error wrapping the provider's error body.
    Failed(Value),
}

impl SendOutcome {
    pub fn status(&self) -> DispatchStatus {
        match self {
            SendOutcome::Sent(_) => DispatchStatus::Sent,
            SendOutcome::Failed(_) => DispatchStatus::Failed,
        }
    }
}

/// Provider-agnostic delivery event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub event_type: EventType,
    /// Provider-native event, kept verbatim.
    pub payload: Value,
    pub event_at: DateTime<Utc>,
}

impl CanonicalEvent {
    pub fn for_tracker(self, tracker_id: Uuid) -> NewEventLog {
        NewEventLog {
            tracker_id,
            event_type: self.event_type,
            payload: self.payload,
            event_at: self.event_at,
        }
    }
}

// ============================================================================
// Query filters
// ============================================================================

/// Filter for listing email logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLogFilter {
    pub provider: Option<String>,
    pub dispatch_status: Option<DispatchStatus>,
    /// Include soft-deactivated rows.
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

impl Default for EmailLogFilter {
    fn default() -> Self {
        Self {
            provider: None,
            dispatch_status: None,
            include_inactive: false,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl EmailLogFilter {
    /// Active rows only.
    pub fn active() -> Self {
        Self::default()
    }

    /// Active and deactivated rows.
    pub fn all() -> Self {
        Self {
            include_inactive: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_mutation_rules() {
        assert_eq!(
            EventType::Opened.tracker_mutation(),
            Some(TrackerMutation::IncrementOpens)
        );
        assert_eq!(
            EventType::Clicked.tracker_mutation(),
            Some(TrackerMutation::IncrementClicks)
        );
        assert_eq!(
            EventType::Delivered.tracker_mutation(),
            Some(TrackerMutation::SetStatus(EmailStatus::Delivered))
        );
        assert_eq!(
            EventType::SoftBounced.tracker_mutation(),
            Some(TrackerMutation::SetStatus(EmailStatus::SoftBounced))
        );
        assert_eq!(
            EventType::HardBounced.tracker_mutation(),
            Some(TrackerMutation::SetStatus(EmailStatus::HardBounced))
        );
        assert_eq!(EventType::Spammed.tracker_mutation(), None);
    }

    #[test]
    fn test_vocabulary_string_forms() {
        assert_eq!(DispatchStatus::Queued.to_string(), "queued");
        assert_eq!(EmailStatus::SoftBounced.to_string(), "soft_bounced");
        assert_eq!(EventType::from_str("hard_bounced").unwrap(), EventType::HardBounced);
        assert_eq!(RecipientType::Bcc.to_string(), "bcc");
        assert_eq!(DeadLetterReason::RetriesExhausted.to_string(), "retries_exhausted");
        assert_eq!(
            serde_json::to_value(EmailStatus::HardBounced).unwrap(),
            serde_json::json!("hard_bounced")
        );
    }

    #[test]
    fn test_new_email_log_starts_queued() {
        let log = EmailLog::new_queued(NewEmailLog {
            provider: "mailjet".into(),
            from_address: "noreply@example.com".into(),
            from_name: None,
            to_addresses: vec!["a@x.com".into()],
            cc_addresses: vec!["b@x.com".into()],
            bcc_addresses: vec![],
            subject: "Hello".into(),
            body: Some("<p>hi</p>".into()),
            template_id: None,
            template_data: None,
            reply_to: None,
            extra: None,
        });

        assert_eq!(log.dispatch_status, DispatchStatus::Queued);
        assert!(log.is_active);
        assert!(log.error_info.is_none());
        assert_eq!(log.recipient_count(), 2);
    }

    #[test]
    fn test_new_tracker_starts_queued_with_zero_counts() {
        let tracker = RecipientTracker::new(
            Uuid::now_v7(),
            ParsedRecipient::new(RecipientType::Cc, "b@x.com", "2"),
        );
        assert_eq!(tracker.email_status, EmailStatus::Queued);
        assert_eq!((tracker.open_count, tracker.click_count), (0, 0));
        assert_eq!(tracker.message_id, "2");
    }

    #[test]
    fn test_filter_accessors() {
        assert!(!EmailLogFilter::active().include_inactive);
        assert!(EmailLogFilter::all().include_inactive);
    }
}
