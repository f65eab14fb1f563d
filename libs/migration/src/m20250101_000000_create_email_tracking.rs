use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create email_logs table
        manager
            .create_table(
                Table::create()
                    .table(EmailLogs::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailLogs::Id))
                    .col(string_len(EmailLogs::Provider, 32))
                    .col(string_len(EmailLogs::FromAddress, 255))
                    .col(string_len_null(EmailLogs::FromName, 255))
                    .col(json_binary(EmailLogs::ToAddresses))
                    .col(json_binary(EmailLogs::CcAddresses).default(Expr::cust("'[]'::jsonb")))
                    .col(json_binary(EmailLogs::BccAddresses).default(Expr::cust("'[]'::jsonb")))
                    .col(text(EmailLogs::Subject))
                    .col(text_null(EmailLogs::Body))
                    .col(string_len_null(EmailLogs::TemplateId, 64))
                    .col(json_binary_null(EmailLogs::TemplateData))
                    .col(
                        ColumnDef::new(EmailLogs::DispatchStatus)
                            .string_len(16)
                            .not_null()
                            .default("queued"),
                    )
                    .col(json_binary_null(EmailLogs::ErrorInfo))
                    .col(string_len_null(EmailLogs::ReplyTo, 255))
                    .col(json_binary_null(EmailLogs::Extra))
                    .col(boolean(EmailLogs::IsActive).default(true))
                    .col(
                        timestamp_with_time_zone(EmailLogs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EmailLogs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create recipient_trackers table
        manager
            .create_table(
                Table::create()
                    .table(RecipientTrackers::Table)
                    .if_not_exists()
                    .col(pk_uuid(RecipientTrackers::Id))
                    .col(uuid(RecipientTrackers::EmailLogId))
                    .col(string_len(RecipientTrackers::RecipientType, 3))
                    .col(string_len(RecipientTrackers::EmailAddress, 255))
                    .col(string_len_uniq(RecipientTrackers::MessageId, 255))
                    .col(integer(RecipientTrackers::OpenCount).default(0))
                    .col(integer(RecipientTrackers::ClickCount).default(0))
                    .col(
                        ColumnDef::new(RecipientTrackers::EmailStatus)
                            .string_len(16)
                            .not_null()
                            .default("queued"),
                    )
                    .col(boolean(RecipientTrackers::IsActive).default(true))
                    .col(
                        timestamp_with_time_zone(RecipientTrackers::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(RecipientTrackers::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recipient_trackers_email_log")
                            .from(RecipientTrackers::Table, RecipientTrackers::EmailLogId)
                            .to(EmailLogs::Table, EmailLogs::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Create event_logs table
        manager
            .create_table(
                Table::create()
                    .table(EventLogs::Table)
                    .if_not_exists()
                    .col(pk_uuid(EventLogs::Id))
                    .col(uuid(EventLogs::TrackerId))
                    .col(string_len(EventLogs::EventType, 16))
                    .col(json_binary(EventLogs::Payload))
                    .col(timestamp_with_time_zone(EventLogs::EventAt))
                    .col(boolean(EventLogs::IsActive).default(true))
                    .col(
                        timestamp_with_time_zone(EventLogs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EventLogs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_logs_tracker")
                            .from(EventLogs::Table, EventLogs::TrackerId)
                            .to(RecipientTrackers::Table, RecipientTrackers::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_provider_status")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::Provider)
                    .col(EmailLogs::DispatchStatus)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_created_at")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_recipient_trackers_email_log_id")
                    .table(RecipientTrackers::Table)
                    .col(RecipientTrackers::EmailLogId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_logs_tracker_event_at")
                    .table(EventLogs::Table)
                    .col(EventLogs::TrackerId)
                    .col(EventLogs::EventAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventLogs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RecipientTrackers::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailLogs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailLogs {
    Table,
    Id,
    Provider,
    FromAddress,
    FromName,
    ToAddresses,
    CcAddresses,
    BccAddresses,
    Subject,
    Body,
    TemplateId,
    TemplateData,
    DispatchStatus,
    ErrorInfo,
    ReplyTo,
    Extra,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RecipientTrackers {
    Table,
    Id,
    EmailLogId,
    RecipientType,
    EmailAddress,
    MessageId,
    OpenCount,
    ClickCount,
    EmailStatus,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EventLogs {
    Table,
    Id,
    TrackerId,
    EventType,
    Payload,
    EventAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
