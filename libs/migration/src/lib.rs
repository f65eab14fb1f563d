pub use sea_orm_migration::prelude::*;

mod m20250101_000000_create_email_tracking;
mod m20250201_000000_create_dead_webhook_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000000_create_email_tracking::Migration),
            Box::new(m20250201_000000_create_dead_webhook_jobs::Migration),
        ]
    }
}
