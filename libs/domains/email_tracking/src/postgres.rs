use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use crate::entity::{dead_letter, email_log, event_log, recipient_tracker};
use crate::error::{EmailError, EmailResult};
use crate::models::{
    DeadLetter, DispatchStatus, EmailLog, EmailLogFilter, EmailStatus, EventLog, NewDeadLetter,
    NewEmailLog, NewEventLog, ParsedRecipient, RecipientTracker, TrackerMutation,
};
use crate::repository::EmailRecordStore;

/// Postgres-backed record store.
///
/// Status transitions and counter increments are single `UPDATE ... RETURNING`
/// statements, so concurrent webhook jobs never lose an update. Ingested events
/// are inserted in the same transaction as their tracker update.
#[derive(Clone)]
pub struct PgEmailRecordStore {
    db: DatabaseConnection,
}

impl PgEmailRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn finish_dispatch(
        &self,
        id: Uuid,
        status: DispatchStatus,
        error_info: Option<Value>,
    ) -> EmailResult<EmailLog> {
        let updated = email_log::Entity::update_many()
            .col_expr(email_log::Column::DispatchStatus, Expr::value(status))
            .col_expr(email_log::Column::ErrorInfo, Expr::value(error_info))
            .col_expr(email_log::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(email_log::Column::Id.eq(id))
            .filter(email_log::Column::IsActive.eq(true))
            .filter(email_log::Column::DispatchStatus.eq(DispatchStatus::Queued))
            .exec_with_returning(&self.db)
            .await?;

        if let Some(model) = updated.into_iter().next() {
            return Ok(model.into());
        }

        // Nothing matched: tell a missing row apart from a finished one
        match self.get_email_log(id).await? {
            Some(log) => Err(EmailError::InvalidTransition {
                id,
                status: log.dispatch_status.to_string(),
            }),
            None => Err(EmailError::NotFound {
                entity: "email log",
                id,
            }),
        }
    }

    async fn update_tracker<C: ConnectionTrait>(
        conn: &C,
        tracker_id: Uuid,
        mutation: TrackerMutation,
    ) -> EmailResult<RecipientTracker> {
        let (column, value) = match mutation {
            TrackerMutation::IncrementOpens => {
                let column = recipient_tracker::Column::OpenCount;
                (column, Expr::col(column).add(1))
            }
            TrackerMutation::IncrementClicks => {
                let column = recipient_tracker::Column::ClickCount;
                (column, Expr::col(column).add(1))
            }
            TrackerMutation::SetStatus(status) => {
                (recipient_tracker::Column::EmailStatus, Expr::value(status))
            }
        };

        recipient_tracker::Entity::update_many()
            .col_expr(column, value)
            .col_expr(recipient_tracker::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(recipient_tracker::Column::Id.eq(tracker_id))
            .filter(recipient_tracker::Column::IsActive.eq(true))
            .exec_with_returning(conn)
            .await?
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or(EmailError::NotFound {
                entity: "recipient tracker",
                id: tracker_id,
            })
    }
}

#[async_trait]
impl EmailRecordStore for PgEmailRecordStore {
    async fn create_email_log(&self, input: NewEmailLog) -> EmailResult<EmailLog> {
        let active_model: email_log::ActiveModel = input.into();
        let model = email_log::Entity::insert(active_model)
            .exec_with_returning(&self.db)
            .await?;

        tracing::debug!(email_log_id = %model.id, provider = %model.provider, "Created email log");
        Ok(model.into())
    }

    async fn get_email_log(&self, id: Uuid) -> EmailResult<Option<EmailLog>> {
        let model = email_log::Entity::find_by_id(id)
            .filter(email_log::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn get_email_log_any(&self, id: Uuid) -> EmailResult<Option<EmailLog>> {
        let model = email_log::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_email_logs(&self, filter: EmailLogFilter) -> EmailResult<Vec<EmailLog>> {
        let mut query = email_log::Entity::find();

        if !filter.include_inactive {
            query = query.filter(email_log::Column::IsActive.eq(true));
        }

        if let Some(provider) = filter.provider {
            query = query.filter(email_log::Column::Provider.eq(provider));
        }

        if let Some(status) = filter.dispatch_status {
            query = query.filter(email_log::Column::DispatchStatus.eq(status));
        }

        let models = query
            .order_by_desc(email_log::Column::CreatedAt)
            .order_by_desc(email_log::Column::Id)
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_email_log_sent(&self, id: Uuid) -> EmailResult<EmailLog> {
        self.finish_dispatch(id, DispatchStatus::Sent, None).await
    }

    async fn mark_email_log_failed(&self, id: Uuid, error_info: Value) -> EmailResult<EmailLog> {
        self.finish_dispatch(id, DispatchStatus::Failed, Some(error_info))
            .await
    }

    async fn create_recipient_trackers(
        &self,
        email_log_id: Uuid,
        recipients: Vec<ParsedRecipient>,
    ) -> EmailResult<Vec<RecipientTracker>> {
        // The unique index catches clashes with stored rows; this catches them
        // inside the batch with a readable message id.
        let mut batch = HashSet::new();
        for recipient in &recipients {
            if !batch.insert(recipient.message_id.as_str()) {
                return Err(EmailError::DuplicateMessageId(recipient.message_id.clone()));
            }
        }

        if recipients.is_empty() {
            return Ok(Vec::new());
        }

        let trackers: Vec<RecipientTracker> = recipients
            .into_iter()
            .map(|r| RecipientTracker::new(email_log_id, r))
            .collect();

        let txn = self.db.begin().await?;

        let existing = recipient_tracker::Entity::find()
            .filter(
                recipient_tracker::Column::MessageId
                    .is_in(trackers.iter().map(|t| t.message_id.clone())),
            )
            .one(&txn)
            .await?;
        if let Some(existing) = existing {
            return Err(EmailError::DuplicateMessageId(existing.message_id));
        }

        recipient_tracker::Entity::insert_many(
            trackers
                .iter()
                .cloned()
                .map(recipient_tracker::ActiveModel::from),
        )
        .exec(&txn)
        .await?;

        txn.commit().await?;

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
        let model = recipient_tracker::Entity::find()
            .filter(recipient_tracker::Column::MessageId.eq(message_id))
            .filter(recipient_tracker::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn list_trackers_for_log(
        &self,
        email_log_id: Uuid,
        include_inactive: bool,
    ) -> EmailResult<Vec<RecipientTracker>> {
        let mut query = recipient_tracker::Entity::find()
            .filter(recipient_tracker::Column::EmailLogId.eq(email_log_id));

        if !include_inactive {
            query = query.filter(recipient_tracker::Column::IsActive.eq(true));
        }

        let models = query
            .order_by_asc(recipient_tracker::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn create_event_log(&self, input: NewEventLog) -> EmailResult<EventLog> {
        let event = EventLog::new(input);
        let model = event_log::Entity::insert(event_log::ActiveModel::from(event))
            .exec_with_returning(&self.db)
            .await?;
        Ok(model.into())
    }

    async fn record_event(
        &self,
        input: NewEventLog,
        mutation: Option<TrackerMutation>,
    ) -> EmailResult<EventLog> {
        let tracker_id = input.tracker_id;
        let txn = self.db.begin().await?;

        // Dropping the transaction on an early return rolls the insert back
        let model = event_log::Entity::insert(event_log::ActiveModel::from(EventLog::new(input)))
            .exec_with_returning(&txn)
            .await?;

        match mutation {
            Some(mutation) => {
                Self::update_tracker(&txn, tracker_id, mutation).await?;
            }
            None => {
                let active = recipient_tracker::Entity::find_by_id(tracker_id)
                    .filter(recipient_tracker::Column::IsActive.eq(true))
                    .count(&txn)
                    .await?;
                if active == 0 {
                    return Err(EmailError::NotFound {
                        entity: "recipient tracker",
                        id: tracker_id,
                    });
                }
            }
        }

        txn.commit().await?;
        Ok(model.into())
    }

    async fn list_events_for_tracker(
        &self,
        tracker_id: Uuid,
        include_inactive: bool,
    ) -> EmailResult<Vec<EventLog>> {
        let mut query =
            event_log::Entity::find().filter(event_log::Column::TrackerId.eq(tracker_id));

        if !include_inactive {
            query = query.filter(event_log::Column::IsActive.eq(true));
        }

        let models = query
            .order_by_asc(event_log::Column::EventAt)
            .order_by_asc(event_log::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn increment_open_count(&self, tracker_id: Uuid) -> EmailResult<RecipientTracker> {
        Self::update_tracker(&self.db, tracker_id, TrackerMutation::IncrementOpens).await
    }

    async fn increment_click_count(&self, tracker_id: Uuid) -> EmailResult<RecipientTracker> {
        Self::update_tracker(&self.db, tracker_id, TrackerMutation::IncrementClicks).await
    }

    async fn set_tracker_status(
        &self,
        tracker_id: Uuid,
        status: EmailStatus,
    ) -> EmailResult<RecipientTracker> {
        Self::update_tracker(&self.db, tracker_id, TrackerMutation::SetStatus(status)).await
    }

    async fn deactivate_email_log(&self, id: Uuid) -> EmailResult<()> {
        let active_children = recipient_tracker::Entity::find()
            .filter(recipient_tracker::Column::EmailLogId.eq(id))
            .filter(recipient_tracker::Column::IsActive.eq(true))
            .count(&self.db)
            .await?;

        if active_children > 0 {
            return Err(EmailError::Protected {
                entity: "email log",
                id,
                children: "recipient trackers",
            });
        }

        let result = email_log::Entity::update_many()
            .col_expr(email_log::Column::IsActive, Expr::value(false))
            .col_expr(email_log::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(email_log::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(EmailError::NotFound {
                entity: "email log",
                id,
            });
        }

        tracing::info!(email_log_id = %id, "Deactivated email log");
        Ok(())
    }

    async fn deactivate_tracker(&self, id: Uuid) -> EmailResult<()> {
        let active_children = event_log::Entity::find()
            .filter(event_log::Column::TrackerId.eq(id))
            .filter(event_log::Column::IsActive.eq(true))
            .count(&self.db)
            .await?;

        if active_children > 0 {
            return Err(EmailError::Protected {
                entity: "recipient tracker",
                id,
                children: "event logs",
            });
        }

        let result = recipient_tracker::Entity::update_many()
            .col_expr(recipient_tracker::Column::IsActive, Expr::value(false))
            .col_expr(recipient_tracker::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(recipient_tracker::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(EmailError::NotFound {
                entity: "recipient tracker",
                id,
            });
        }

        tracing::info!(tracker_id = %id, "Deactivated recipient tracker");
        Ok(())
    }

    async fn deactivate_event_log(&self, id: Uuid) -> EmailResult<()> {
        let result = event_log::Entity::update_many()
            .col_expr(event_log::Column::IsActive, Expr::value(false))
            .col_expr(event_log::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(event_log::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(EmailError::NotFound {
                entity: "event log",
                id,
            });
        }
        Ok(())
    }

    async fn create_dead_letter(&self, input: NewDeadLetter) -> EmailResult<DeadLetter> {
        let model = dead_letter::Entity::insert(dead_letter::ActiveModel::from(DeadLetter::new(input)))
            .exec_with_returning(&self.db)
            .await?;

        tracing::debug!(dead_letter_id = %model.id, job_id = %model.job_id, "Stored dead webhook job");
        Ok(model.into())
    }

    async fn list_dead_letters(&self, limit: u64) -> EmailResult<Vec<DeadLetter>> {
        let models = dead_letter::Entity::find()
            .order_by_desc(dead_letter::Column::FailedAt)
            .order_by_desc(dead_letter::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}
