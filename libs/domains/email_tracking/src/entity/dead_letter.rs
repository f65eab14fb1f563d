use crate::models::{DeadLetter, DeadLetterReason};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dead_webhook_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub provider: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    #[sea_orm(column_type = "Text")]
    pub error: String,
    pub reason: DeadLetterReason,
    pub attempts: i32,
    pub received_at: DateTimeWithTimeZone,
    pub failed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DeadLetter {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            job_id: model.job_id,
            provider: model.provider,
            payload: model.payload,
            error: model.error,
            reason: model.reason,
            attempts: u32::try_from(model.attempts).unwrap_or_default(),
            received_at: model.received_at.into(),
            failed_at: model.failed_at.into(),
        }
    }
}

impl From<DeadLetter> for ActiveModel {
    fn from(entry: DeadLetter) -> Self {
        ActiveModel {
            id: Set(entry.id),
            job_id: Set(entry.job_id),
            provider: Set(entry.provider),
            payload: Set(entry.payload),
            error: Set(entry.error),
            reason: Set(entry.reason),
            attempts: Set(i32::try_from(entry.attempts).unwrap_or(i32::MAX)),
            received_at: Set(entry.received_at.into()),
            failed_at: Set(entry.failed_at.into()),
        }
    }
}
