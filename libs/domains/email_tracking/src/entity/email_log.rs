use crate::models::{DispatchStatus, EmailLog, NewEmailLog};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{from_json, to_json};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub provider: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to_addresses: Json,
    pub cc_addresses: Json,
    pub bcc_addresses: Json,
    #[sea_orm(column_type = "Text")]
    pub subject: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,
    pub template_id: Option<String>,
    pub template_data: Option<Json>,
    pub dispatch_status: DispatchStatus,
    pub error_info: Option<Json>,
    pub reply_to: Option<String>,
    pub extra: Option<Json>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipient_tracker::Entity")]
    RecipientTracker,
}

impl Related<super::recipient_tracker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipientTracker.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EmailLog {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            provider: model.provider,
            from_address: model.from_address,
            from_name: model.from_name,
            to_addresses: from_json(model.to_addresses),
            cc_addresses: from_json(model.cc_addresses),
            bcc_addresses: from_json(model.bcc_addresses),
            subject: model.subject,
            body: model.body,
            template_id: model.template_id,
            template_data: model.template_data,
            dispatch_status: model.dispatch_status,
            error_info: model.error_info,
            reply_to: model.reply_to,
            extra: model.extra.and_then(|extra| match extra {
                Json::Object(map) => Some(map),
                _ => None,
            }),
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<NewEmailLog> for ActiveModel {
    fn from(input: NewEmailLog) -> Self {
        let now = chrono::Utc::now();

        ActiveModel {
            id: Set(Uuid::now_v7()),
            provider: Set(input.provider),
            from_address: Set(input.from_address),
            from_name: Set(input.from_name),
            to_addresses: Set(to_json(&input.to_addresses)),
            cc_addresses: Set(to_json(&input.cc_addresses)),
            bcc_addresses: Set(to_json(&input.bcc_addresses)),
            subject: Set(input.subject),
            body: Set(input.body),
            template_id: Set(input.template_id),
            template_data: Set(input.template_data),
            dispatch_status: Set(DispatchStatus::Queued),
            error_info: Set(None),
            reply_to: Set(input.reply_to),
            extra: Set(input.extra.map(Json::Object)),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }
}
