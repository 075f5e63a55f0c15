//! Registry Notification Poller
//!
//! Runs a single bounded poll against the configured registry queue and
//! prints the collected notifications as JSON on stdout. Logs go to stderr.
//!
//! Schedule it externally (cron, a job runner) and feed the newest
//! `createdAt` from the previous run back in with `--since`.
//!
//! ## Development Mode
//!
//! Set `REGISTRY_POLLER_DEV_MODE=true` to poll a throwaway in-memory SQLite
//! queue regardless of the configured queue type. Fill it with `--seed`.

mod seed;

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};

use rn_config::{AppConfig, ConfigLoader, QueueType};
use rn_poller::{MessageClassifier, NotificationPoller, PollResult, PollerConfig};
use rn_queue::sqlite::SqliteRegistryQueue;
use rn_queue::{HttpRegistryQueue, RegistryQueueClient};

use crate::seed::SeedFile;

#[derive(Parser, Debug)]
#[command(name = "rn-poller")]
#[command(about = "Drain registry domain notifications within a fixed time budget")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "REGISTRY_POLLER_CONFIG")]
    config: Option<String>,

    /// Maximum notifications to return (defaults to poller.default_limit)
    #[arg(long)]
    limit: Option<u32>,

    /// Drop notifications created before this RFC 3339 instant
    #[arg(long, value_parser = parse_since)]
    since: Option<DateTime<Utc>>,

    /// JSON file of messages and details loaded into the SQLite queue before polling
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long, default_value = "false")]
    pretty: bool,

    /// Print an example config file and exit
    #[arg(long, default_value = "false")]
    example_config: bool,
}

fn parse_since(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    if args.example_config {
        print!("{}", AppConfig::example_toml());
        return Ok(());
    }

    rn_common::logging::init_logging("rn-poller");

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("Failed to load configuration")?;

    let limit = resolve_limit(args.limit, &config)?;
    let seed = args.seed.as_deref().map(SeedFile::from_path).transpose()?;
    let client = build_client(&config, seed.as_ref()).await?;
    let classifier = MessageClassifier::from_config(&config.classifier);
    let classifier_codes = classifier.len();

    let poller = NotificationPoller::new(
        client.clone(),
        classifier,
        PollerConfig::from_settings(&config.poller),
    );

    info!(
        queue = %client.identifier(),
        queue_type = %config.effective_queue_type(),
        limit = limit.get(),
        since = ?args.since,
        time_budget_secs = poller.config().time_budget.as_secs(),
        classifier_codes,
        "Starting registry poll"
    );

    client.connect().await.context("Failed to open registry session")?;

    let outcome = poller.poll(limit, args.since).await;

    // Session is released whether or not the poll succeeded
    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "Failed to close registry session");
    }

    let result = outcome.context("Registry poll failed")?;
    print_result(&result, args.pretty)?;

    Ok(())
}

fn resolve_limit(requested: Option<u32>, config: &AppConfig) -> Result<NonZeroU32> {
    let raw = requested.unwrap_or(config.poller.default_limit);
    match NonZeroU32::new(raw) {
        Some(limit) => Ok(limit),
        None => bail!("--limit must be at least 1"),
    }
}

async fn build_client(config: &AppConfig, seed: Option<&SeedFile>) -> Result<Arc<dyn RegistryQueueClient>> {
    match config.effective_queue_type() {
        QueueType::Http => {
            if seed.is_some() {
                bail!("--seed only applies to the sqlite queue");
            }
            let name = format!("http:{}", config.queue.http.base_url);
            let queue = HttpRegistryQueue::new(name, &config.queue.http)
                .context("Failed to build HTTP registry client")?;
            Ok(Arc::new(queue))
        }
        QueueType::Sqlite => {
            if config.dev_mode {
                info!("Dev mode enabled, using in-memory SQLite registry queue");
            }
            let url = config.effective_sqlite_url();
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .with_context(|| format!("Failed to open SQLite queue at {}", url))?;

            let queue = SqliteRegistryQueue::new(pool, config.queue.sqlite.queue_name.clone());
            queue.init_schema().await.context("Failed to initialize SQLite queue schema")?;
            if let Some(seed) = seed {
                seed.apply(&queue).await?;
            }
            Ok(Arc::new(queue))
        }
    }
}

fn print_result(result: &PollResult, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{}", json);
    Ok(())
}
