use crate::models::{EmailStatus, RecipientTracker, RecipientType};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipient_trackers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email_log_id: Uuid,
    pub recipient_type: RecipientType,
    pub email_address: String,
    #[sea_orm(unique)]
    pub message_id: String,
    pub open_count: i32,
    pub click_count: i32,
    pub email_status: EmailStatus,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_log::Entity",
        from = "Column::EmailLogId",
        to = "super::email_log::Column::Id",
        on_delete = "Restrict"
    )]
    EmailLog,
    #[sea_orm(has_many = "super::event_log::Entity")]
    EventLog,
}

impl Related<super::email_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailLog.def()
    }
}

impl Related<super::event_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RecipientTracker {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email_log_id: model.email_log_id,
            recipient_type: model.recipient_type,
            email_address: model.email_address,
            message_id: model.message_id,
            open_count: u32::try_from(model.open_count).unwrap_or_default(),
            click_count: u32::try_from(model.click_count).unwrap_or_default(),
            email_status: model.email_status,
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<RecipientTracker> for ActiveModel {
    fn from(tracker: RecipientTracker) -> Self {
        ActiveModel {
            id: Set(tracker.id),
            email_log_id: Set(tracker.email_log_id),
            recipient_type: Set(tracker.recipient_type),
            email_address: Set(tracker.email_address),
            message_id: Set(tracker.message_id),
            open_count: Set(i32::try_from(tracker.open_count).unwrap_or(i32::MAX)),
            click_count: Set(i32::try_from(tracker.click_count).unwrap_or(i32::MAX)),
            email_status: Set(tracker.email_status),
            is_active: Set(tracker.is_active),
            created_at: Set(tracker.created_at.into()),
            updated_at: Set(tracker.updated_at.into()),
        }
    }
}
