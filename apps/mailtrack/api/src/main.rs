//! Mailtrack API - Entry Point
//!
//! Serves provider webhooks and runs the ingestion worker.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mailtrack_api::run().await
}
