use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EmailError, EmailResult};
use crate::models::{
    DeadLetter, DispatchStatus, EmailLog, EmailLogFilter, EmailStatus, EventLog, NewDeadLetter,
    NewEmailLog, NewEventLog, ParsedRecipient, RecipientTracker, TrackerMutation,
};

/// Durable store for email logs, recipient trackers and event logs.
///
/// Reads that take `include_inactive` make soft-delete filtering explicit at the
/// call site; `get_*`/`find_*` without it only see active rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailRecordStore: Send + Sync {
    /// Create a log in `queued` status
    async fn create_email_log(&self, input: NewEmailLog) -> EmailResult<EmailLog>;

    /// Get an active log by ID
    async fn get_email_log(&self, id: Uuid) -> EmailResult<Option<EmailLog>>;

    /// Get a log by ID regardless of its active flag
    async fn get_email_log_any(&self, id: Uuid) -> EmailResult<Option<EmailLog>>;

    /// List logs, newest first
    async fn list_email_logs(&self, filter: EmailLogFilter) -> EmailResult<Vec<EmailLog>>;

    /// Move a queued log to `sent`
    async fn mark_email_log_sent(&self, id: Uuid) -> EmailResult<EmailLog>;

    /// Move a queued log to `failed`, storing the structured error
    async fn mark_email_log_failed(&self, id: Uuid, error_info: Value) -> EmailResult<EmailLog>;

    /// Create one tracker per recipient, all or nothing
    async fn create_recipient_trackers(
        &self,
        email_log_id: Uuid,
        recipients: Vec<ParsedRecipient>,
    ) -> EmailResult<Vec<RecipientTracker>>;

    /// Find the active tracker carrying this message id
    async fn find_tracker_by_message_id(
        &self,
        message_id: &str,
    ) -> EmailResult<Option<RecipientTracker>>;

    /// Trackers of a log in creation order
    async fn list_trackers_for_log(
        &self,
        email_log_id: Uuid,
        include_inactive: bool,
    ) -> EmailResult<Vec<RecipientTracker>>;

    async fn create_event_log(&self, input: NewEventLog) -> EmailResult<EventLog>;

    /// Append an event and apply its tracker mutation as one unit.
    ///
    /// Either both writes land or neither does, so a retried webhook job
    /// never leaves a second event behind.
    async fn record_event(
        &self,
        input: NewEventLog,
        mutation: Option<TrackerMutation>,
    ) -> EmailResult<EventLog>;

    /// Events of a tracker ordered by event timestamp
    async fn list_events_for_tracker(
        &self,
        tracker_id: Uuid,
        include_inactive: bool,
    ) -> EmailResult<Vec<EventLog>>;

    /// Atomically add one to the open count
    async fn increment_open_count(&self, tracker_id: Uuid) -> EmailResult<RecipientTracker>;

    /// Atomically add one to the click count
    async fn increment_click_count(&self, tracker_id: Uuid) -> EmailResult<RecipientTracker>;

    async fn set_tracker_status(
        &self,
        tracker_id: Uuid,
        status: EmailStatus,
    ) -> EmailResult<RecipientTracker>;

    /// Soft delete; fails while active trackers reference the log
    async fn deactivate_email_log(&self, id: Uuid) -> EmailResult<()>;

    /// Soft delete; fails while active events reference the tracker
    async fn deactivate_tracker(&self, id: Uuid) -> EmailResult<()>;

    async fn deactivate_event_log(&self, id: Uuid) -> EmailResult<()>;

    /// Keep a webhook job the worker gave up on
    async fn create_dead_letter(&self, input: NewDeadLetter) -> EmailResult<DeadLetter>;

    /// Dead letters, newest first
    async fn list_dead_letters(&self, limit: u64) -> EmailResult<Vec<DeadLetter>>;
}

#[derive(Debug, Default)]
struct Inner {
    logs: HashMap<Uuid, EmailLog>,
    trackers: HashMap<Uuid, RecipientTracker>,
    /// message_id -> tracker id, covers inactive trackers too
    message_index: HashMap<String, Uuid>,
    events: HashMap<Uuid, EventLog>,
    dead_letters: Vec<DeadLetter>,
}

impl Inner {
    fn tracker_mut(&mut self, id: Uuid) -> EmailResult<&mut RecipientTracker> {
        self.trackers
            .get_mut(&id)
            .filter(|t| t.is_active)
            .ok_or(EmailError::NotFound {
                entity: "recipient tracker",
                id,
            })
    }

    fn mutate_tracker(
        &mut self,
        id: Uuid,
        mutation: TrackerMutation,
    ) -> EmailResult<RecipientTracker> {
        let tracker = self.tracker_mut(id)?;
        match mutation {
            TrackerMutation::IncrementOpens => {
                tracker.open_count = tracker.open_count.saturating_add(1);
            }
            TrackerMutation::IncrementClicks => {
                tracker.click_count = tracker.click_count.saturating_add(1);
            }
            TrackerMutation::SetStatus(status) => tracker.email_status = status,
        }
        tracker.updated_at = Utc::now();
        Ok(tracker.clone())
    }

    fn finish_dispatch(
        &mut self,
        id: Uuid,
        status: DispatchStatus,
        error_info: Option<Value>,
    ) -> EmailResult<EmailLog> {
        let log = self
            .logs
            .get_mut(&id)
            .filter(|l| l.is_active)
            .ok_or(EmailError::NotFound {
                entity: "email log",
                id,
            })?;

        if log.dispatch_status != DispatchStatus::Queued {
            return Err(EmailError::InvalidTransition {
                id,
                status: log.dispatch_status.to_string(),
            });
        }

        log.dispatch_status = status;
        log.error_info = error_info;
        log.updated_at = Utc::now();
        Ok(log.clone())
    }
}

/// In-memory implementation of EmailRecordStore (for development/testing)
///
/// Every operation holds the write lock for its whole duration, so counter
/// increments are serialized.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEmailRecordStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEmailRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmailRecordStore for InMemoryEmailRecordStore {
    async fn create_email_log(&self, input: NewEmailLog) -> EmailResult<EmailLog> {
        let log = EmailLog::new_queued(input);
        self.inner.write().await.logs.insert(log.id, log.clone());

        tracing::debug!(email_log_id = %log.id, provider = %log.provider, "Created email log");
        Ok(log)
    }

    async fn get_email_log(&self, id: Uuid) -> EmailResult<Option<EmailLog>> {
        let inner = self.inner.read().await;
        Ok(inner.logs.get(&id).filter(|l| l.is_active).cloned())
    }

    async fn get_email_log_any(&self, id: Uuid) -> EmailResult<Option<EmailLog>> {
        Ok(self.inner.read().await.logs.get(&id).cloned())
    }

    async fn list_email_logs(&self, filter: EmailLogFilter) -> EmailResult<Vec<EmailLog>> {
        let inner = self.inner.read().await;

        let mut result: Vec<EmailLog> = inner
            .logs
            .values()
            .filter(|l| filter.include_inactive || l.is_active)
            .filter(|l| filter.provider.as_ref().is_none_or(|p| &l.provider == p))
            .filter(|l| filter.dispatch_status.is_none_or(|s| l.dispatch_status == s))
            .cloned()
            .collect();

        // UUIDv7 ids break created_at ties in creation order
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(result
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn mark_email_log_sent(&self, id: Uuid) -> EmailResult<EmailLog> {
        let mut inner = self.inner.write().await;
        inner.finish_dispatch(id, DispatchStatus::Sent, None)
    }

    async fn mark_email_log_failed(&self, id: Uuid, error_info: Value) -> EmailResult<EmailLog> {
        let mut inner = self.inner.write().await;
        inner.finish_dispatch(id, DispatchStatus::Failed, Some(error_info))
    }

    async fn create_recipient_trackers(
        &self,
        email_log_id: Uuid,
        recipients: Vec<ParsedRecipient>,
    ) -> EmailResult<Vec<RecipientTracker>> {
        let mut inner = self.inner.write().await;

        if !inner.logs.contains_key(&email_log_id) {
            return Err(EmailError::NotFound {
                entity: "email log",
                id: email_log_id,
            });
        }

        // Validate the whole batch before touching state
        let mut batch = HashSet::new();
        for recipient in &recipients {
            if inner.message_index.contains_key(&recipient.message_id)
                || !batch.insert(recipient.message_id.as_str())
            {
                return Err(EmailError::DuplicateMessageId(recipient.message_id.clone()));
            }
        }

        let trackers: Vec<RecipientTracker> = recipients
            .into_iter()
            .map(|r| RecipientTracker::new(email_log_id, r))
            .collect();

        for tracker in &trackers {
            inner
                .message_index
                .insert(tracker.message_id.clone(), tracker.id);
            inner.trackers.insert(tracker.id, tracker.clone());
        }

        tracing::debug!(
            email_log_id = %email_log_id,
            count = trackers.len(),
            "Created recipient trackers"
        );
        Ok(trackers)
    }

    async fn find_tracker_by_message_id(
        &self,
        message_id: &str,
    ) -> EmailResult<Option<RecipientTracker>> {
        let inner = self.inner.read().await;
        Ok(inner
            .message_index
            .get(message_id)
            .and_then(|id| inner.trackers.get(id))
            .filter(|t| t.is_active)
            .cloned())
    }

    async fn list_trackers_for_log(
        &self,
        email_log_id: Uuid,
        include_inactive: bool,
    ) -> EmailResult<Vec<RecipientTracker>> {
        let inner = self.inner.read().await;

        let mut result: Vec<RecipientTracker> = inner
            .trackers
            .values()
            .filter(|t| t.email_log_id == email_log_id)
            .filter(|t| include_inactive || t.is_active)
            .cloned()
            .collect();

        result.sort_by_key(|t| t.id);
        Ok(result)
    }

    async fn create_event_log(&self, input: NewEventLog) -> EmailResult<EventLog> {
        let mut inner = self.inner.write().await;

        if !inner.trackers.contains_key(&input.tracker_id) {
            return Err(EmailError::NotFound {
                entity: "recipient tracker",
                id: input.tracker_id,
            });
        }

        let event = EventLog::new(input);
        inner.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn record_event(
        &self,
        input: NewEventLog,
        mutation: Option<TrackerMutation>,
    ) -> EmailResult<EventLog> {
        let mut inner = self.inner.write().await;

        match mutation {
            Some(mutation) => {
                inner.mutate_tracker(input.tracker_id, mutation)?;
            }
            None => {
                inner.tracker_mut(input.tracker_id)?;
            }
        }

        let event = EventLog::new(input);
        inner.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn list_events_for_tracker(
        &self,
        tracker_id: Uuid,
        include_inactive: bool,
    ) -> EmailResult<Vec<EventLog>> {
        let inner = self.inner.read().await;

        let mut result: Vec<EventLog> = inner
            .events
            .values()
            .filter(|e| e.tracker_id == tracker_id)
            .filter(|e| include_inactive || e.is_active)
            .cloned()
            .collect();

        result.sort_by(|a, b| a.event_at.cmp(&b.event_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn increment_open_count(&self, tracker_id: Uuid) -> EmailResult<RecipientTracker> {
        let mut inner = self.inner.write().await;
        inner.mutate_tracker(tracker_id, TrackerMutation::IncrementOpens)
    }

    async fn increment_click_count(&self, tracker_id: Uuid) -> EmailResult<RecipientTracker> {
        let mut inner = self.inner.write().await;
        inner.mutate_tracker(tracker_id, TrackerMutation::IncrementClicks)
    }

    async fn set_tracker_status(
        &self,
        tracker_id: Uuid,
        status: EmailStatus,
    ) -> EmailResult<RecipientTracker> {
        let mut inner = self.inner.write().await;
        inner.mutate_tracker(tracker_id, TrackerMutation::SetStatus(status))
    }

    async fn deactivate_email_log(&self, id: Uuid) -> EmailResult<()> {
        let mut inner = self.inner.write().await;

        if inner
            .trackers
            .values()
            .any(|t| t.email_log_id == id && t.is_active)
        {
            return Err(EmailError::Protected {
                entity: "email log",
                id,
                children: "recipient trackers",
            });
        }

        let log = inner.logs.get_mut(&id).ok_or(EmailError::NotFound {
            entity: "email log",
            id,
        })?;
        log.is_active = false;
        log.updated_at = Utc::now();

        tracing::info!(email_log_id = %id, "Deactivated email log");
        Ok(())
    }

    async fn deactivate_tracker(&self, id: Uuid) -> EmailResult<()> {
        let mut inner = self.inner.write().await;

        if inner
            .events
            .values()
            .any(|e| e.tracker_id == id && e.is_active)
        {
            return Err(EmailError::Protected {
                entity: "recipient tracker",
                id,
                children: "event logs",
            });
        }

        let tracker = inner.trackers.get_mut(&id).ok_or(EmailError::NotFound {
            entity: "recipient tracker",
            id,
        })?;
        tracker.is_active = false;
        tracker.updated_at = Utc::now();

        tracing::info!(tracker_id = %id, "Deactivated recipient tracker");
        Ok(())
    }

    async fn deactivate_event_log(&self, id: Uuid) -> EmailResult<()> {
        let mut inner = self.inner.write().await;

        let event = inner.events.get_mut(&id).ok_or(EmailError::NotFound {
            entity: "event log",
            id,
        })?;
        event.is_active = false;
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn create_dead_letter(&self, input: NewDeadLetter) -> EmailResult<DeadLetter> {
        let entry = DeadLetter::new(input);
        self.inner.write().await.dead_letters.push(entry.clone());
        Ok(entry)
    }

    async fn list_dead_letters(&self, limit: u64) -> EmailResult<Vec<DeadLetter>> {
        let inner = self.inner.read().await;
        Ok(inner
            .dead_letters
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
