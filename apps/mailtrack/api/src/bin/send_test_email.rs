//! Send one email through the dispatch service and print the result.
//!
//! Uses the same environment as the API: Postgres when `DATABASE_URL` is set,
//! otherwise an in-memory store that lives only for this run.

use std::sync::Arc;

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_email_tracking::{
    EmailRecordStore, EmailService, InMemoryEmailRecordStore, PgEmailRecordStore,
    ProviderRegistry, SendEmailRequest,
};
use eyre::WrapErr;
use mailtrack_api::{build_registry, connect_database, Config};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "send_test_email", about = "Send a test email and print its log")]
struct Args {
    /// Primary recipient (repeatable)
    #[arg(long, required = true)]
    to: Vec<String>,

    /// Carbon-copy recipient (repeatable)
    #[arg(long)]
    cc: Vec<String>,

    /// Blind carbon-copy recipient (repeatable)
    #[arg(long)]
    bcc: Vec<String>,

    #[arg(long, default_value = "Test email")]
    subject: String,

    /// HTML body, ignored when a template is given
    #[arg(long, default_value = "<p>This is a test email.</p>")]
    body: String,

    /// Provider template id
    #[arg(long)]
    template_id: Option<String>,

    /// Template variables as a JSON object
    #[arg(long, requires = "template_id")]
    template_data: Option<String>,

    /// Provider name; defaults to EMAIL_DEFAULT_PROVIDER
    #[arg(long)]
    provider: Option<String>,

    /// Sender address; defaults to EMAIL_DEFAULT_FROM_ADDRESS
    #[arg(long)]
    from: Option<String>,

    #[arg(long)]
    reply_to: Option<String>,
}

impl Args {
    fn into_request(self) -> eyre::Result<SendEmailRequest> {
        let mut request = SendEmailRequest::new(self.to, self.subject)
            .with_cc(self.cc)
            .with_bcc(self.bcc);

        request = match self.template_id {
            Some(template_id) => {
                let data = match self.template_data {
                    Some(raw) => serde_json::from_str::<Value>(&raw)
                        .wrap_err("--template-data is not valid JSON")?,
                    None => json!({}),
                };
                request.with_template(template_id, data)
            }
            None => request.with_body(self.body),
        };

        if let Some(provider) = self.provider {
            request = request.with_provider(provider);
        }
        if let Some(from) = self.from {
            request = request.with_sender(from, None);
        }
        if let Some(reply_to) = self.reply_to {
            request = request.with_reply_to(reply_to);
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let args = Args::parse();
    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let request = args.into_request()?;
    let registry = Arc::new(build_registry(&config)?);

    match config.database.clone() {
        Some(database) => {
            let db = connect_database(&database).await?;
            send(Arc::new(PgEmailRecordStore::new(db)), registry, config, request).await
        }
        None => send(Arc::new(InMemoryEmailRecordStore::new()), registry, config, request).await,
    }
}

async fn send<S: EmailRecordStore>(
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    config: Config,
    request: SendEmailRequest,
) -> eyre::Result<()> {
    let service = EmailService::new(store, registry, config.mailer);

    let log = service.send_email(request).await?;
    let trackers = service.trackers_for(log.id).await?;

    let report = json!({ "email_log": log, "recipient_trackers": trackers });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
