use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{EmailError, EmailResult};
use crate::models::{DeadLetter, EventLog, NewDeadLetter};
use crate::registry::ProviderRegistry;
use crate::repository::EmailRecordStore;

/// Correlates provider webhook events with recipient trackers.
pub struct EventIngestor<S: EmailRecordStore> {
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
}

impl<S: EmailRecordStore> Clone for EventIngestor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: EmailRecordStore> EventIngestor<S> {
    pub fn new(store: Arc<S>, registry: Arc<ProviderRegistry>) -> Self {
        Self { store, registry }
    }

    /// Keep a webhook job that will not be ingested.
    pub async fn store_dead_letter(&self, entry: NewDeadLetter) -> EmailResult<DeadLetter> {
        self.store.create_dead_letter(entry).await
    }

    /// Record one webhook event and apply its tracker mutation.
    ///
    /// Fails with [`EmailError::TrackerNotFound`] when no active tracker carries
    /// the event's message id; the caller is expected to retry that case.
    pub async fn handle_webhook(&self, provider: &str, raw: &Value) -> EmailResult<EventLog> {
        let adapter = self.registry.resolve(provider)?;
        let (message_id, event) = adapter.parse_webhook_event(raw)?;

        let tracker = self
            .store
            .find_tracker_by_message_id(&message_id)
            .await?
            .ok_or_else(|| EmailError::TrackerNotFound(message_id.clone()))?;

        let event_type = event.event_type;
        let mutation = event_type.tracker_mutation();
        if mutation.is_none() {
            debug!(message_id = %message_id, event_type = %event_type, "Event leaves tracker unchanged");
        }

        let event_log = self
            .store
            .record_event(event.for_tracker(tracker.id), mutation)
            .await?;

        info!(
            provider = %provider,
            message_id = %message_id,
            event_type = %event_type,
            "Ingested webhook event"
        );
        Ok(event_log)
    }
}
