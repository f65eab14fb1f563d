use crate::models::{EventLog, EventType};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tracker_id: Uuid,
    pub event_type: EventType,
    pub payload: Json,
    pub event_at: DateTimeWithTimeZone,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::recipient_tracker::Entity",
        from = "Column::TrackerId",
        to = "super::recipient_tracker::Column::Id",
        on_delete = "Restrict"
    )]
    RecipientTracker,
}

impl Related<super::recipient_tracker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipientTracker.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EventLog {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            tracker_id: model.tracker_id,
            event_type: model.event_type,
            payload: model.payload,
            event_at: model.event_at.into(),
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<EventLog> for ActiveModel {
    fn from(event: EventLog) -> Self {
        ActiveModel {
            id: Set(event.id),
            tracker_id: Set(event.tracker_id),
            event_type: Set(event.event_type),
            payload: Set(event.payload),
            event_at: Set(event.event_at.into()),
            is_active: Set(event.is_active),
            created_at: Set(event.created_at.into()),
            updated_at: Set(event.updated_at.into()),
        }
    }
}
