use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeadWebhookJobs::Table)
                    .if_not_exists()
                    .col(pk_uuid(DeadWebhookJobs::Id))
                    .col(uuid(DeadWebhookJobs::JobId))
                    .col(string_len(DeadWebhookJobs::Provider, 32))
                    .col(text(DeadWebhookJobs::Payload))
                    .col(text(DeadWebhookJobs::Error))
                    .col(string_len(DeadWebhookJobs::Reason, 24))
                    .col(integer(DeadWebhookJobs::Attempts))
                    .col(timestamp_with_time_zone(DeadWebhookJobs::ReceivedAt))
                    .col(
                        timestamp_with_time_zone(DeadWebhookJobs::FailedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dead_webhook_jobs_failed_at")
                    .table(DeadWebhookJobs::Table)
                    .col(DeadWebhookJobs::FailedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeadWebhookJobs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum DeadWebhookJobs {
    Table,
    Id,
    JobId,
    Provider,
    Payload,
    Error,
    Reason,
    Attempts,
    ReceivedAt,
    FailedAt,
}
