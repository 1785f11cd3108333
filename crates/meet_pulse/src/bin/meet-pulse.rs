use std::{str::FromStr, sync::Arc, time::Duration};

use apalis::{
    layers::{retry::RetryPolicy, sentry::SentryLayer},
    prelude::*,
};
use apalis_cron::{CronStream, Tick};
use clap::{Parser, Subcommand};
use cron::Schedule;
use meet_datastore::PgDataStore;
use meet_pulse::{
    calendar::google::GoogleCalendar,
    http::{create_router, AppState},
    provider::recall::RecallClient,
    tracing::init_tracing_subscriber,
    BotSchedulerBuilder, ChannelDispatcher, TranscriptBuffer, WebhookProcessor,
};

#[derive(Parser)]
#[command(name = "meet-pulse", about = "Meeting recording bot scheduler and webhook service")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Recall API key
    #[arg(long, env = "RECALL_API_KEY")]
    recall_api_key: String,

    /// Google OAuth client id
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    google_client_id: String,

    /// Google OAuth client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
    google_client_secret: String,

    /// Public base URL the provider posts webhooks back to
    #[arg(long, env = "PUBLIC_BASE_URL")]
    public_base_url: String,

    /// Shared secret expected in the x-webhook-secret header
    #[arg(long, env = "WEBHOOK_SECRET")]
    webhook_secret: Option<String>,

    /// How many days ahead to sync calendar events
    #[arg(long, env = "SYNC_HORIZON_DAYS", default_value = "7")]
    sync_horizon_days: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the webhook and transcript-poll HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },
    /// Run one sync + schedule pass and exit
    Run,
    /// Start the recurring sync + schedule job
    Cron {
        /// Cron schedule expression
        #[arg(long, env = "CRON_SCHEDULE", default_value = "0 * * * * *")]
        schedule: String,
    },
}

#[derive(Clone)]
struct Config {
    db_url: String,
    recall_api_key: String,
    google_client_id: String,
    google_client_secret: String,
    webhook_url: String,
    webhook_secret: Option<String>,
    sync_horizon_days: i64,
}

async fn run_scheduler(config: &Config) -> anyhow::Result<()> {
    let store = PgDataStore::init(&config.db_url).await?;
    let calendar = GoogleCalendar::new(&config.google_client_id, &config.google_client_secret);
    let provider = RecallClient::new(&config.recall_api_key);

    let scheduler = BotSchedulerBuilder::new(&config.webhook_url)
        .store(store)
        .calendar_api(calendar)
        .provider(provider)
        .sync_horizon_days(config.sync_horizon_days)
        .build();

    scheduler.run().await
}

async fn serve(config: &Config, port: u16) -> anyhow::Result<()> {
    let store = PgDataStore::init(&config.db_url).await?;
    let provider = Arc::new(RecallClient::new(&config.recall_api_key));

    let transcripts = TranscriptBuffer::new();
    // entries outlive their meeting by at most two hours
    transcripts.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(2 * 60 * 60));

    let (dispatcher, mut evaluations) = ChannelDispatcher::new(64);
    tokio::spawn(async move {
        // handoff point for the evaluation pipeline
        while let Some(job) = evaluations.recv().await {
            tracing::info!(
                bot_id = %job.bot_id,
                evaluation_id = %job.evaluation_id,
                "Evaluation job queued"
            );
        }
    });

    let processor = WebhookProcessor::new(store, transcripts, dispatcher);
    let router = create_router(AppState {
        processor,
        provider,
        webhook_secret: config.webhook_secret.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "Listening for webhooks");
    axum::serve(listener, router).await?;

    Ok(())
}

async fn handle_tick(_tick: Tick, config: Data<Config>) -> anyhow::Result<()> {
    tracing::info!("Running scheduled sync + schedule pass...");
    run_scheduler(&config).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let config = Config {
        db_url: cli.database_url,
        recall_api_key: cli.recall_api_key,
        google_client_id: cli.google_client_id,
        google_client_secret: cli.google_client_secret,
        webhook_url: format!(
            "{}/webhooks/provider",
            cli.public_base_url.trim_end_matches('/')
        ),
        webhook_secret: cli.webhook_secret,
        sync_horizon_days: cli.sync_horizon_days,
    };

    match cli.command {
        Command::Serve { port } => {
            serve(&config, port).await?;
        }
        Command::Run => {
            tracing::info!("Running sync + schedule pass once...");
            run_scheduler(&config).await?;
        }
        Command::Cron { schedule } => {
            tracing::info!(%schedule, "Starting cron scheduler...");
            let schedule = Schedule::from_str(&schedule)?;

            let worker = WorkerBuilder::new("meet-pulse-cron")
                .backend(CronStream::new(schedule))
                .retry(RetryPolicy::retries(3))
                .layer(SentryLayer::new())
                .data(config)
                .build(handle_tick);

            worker.run().await?;
        }
    }

    Ok(())
}
