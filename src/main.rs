//! calendar-server - Merkle aggregation, signed calendar ledger and anchoring core

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calendar_server::background::{ensure_genesis, BackgroundJobRunner};
use calendar_server::broker::ChannelBroker;
use calendar_server::calendar::{BlockSigner, CalendarChain};
use calendar_server::config::Config;
use calendar_server::lock::LockScheduler;
use calendar_server::storage::{SqliteBlockStore, SqliteLockService};

#[derive(Parser, Debug)]
#[command(name = "calendar-server")]
#[command(about = "Merkle aggregation, signed calendar ledger and blockchain anchoring core")]
struct Args {
    /// Path to SQLite database
    #[arg(long, env = "CAL_DATABASE_PATH", default_value = "./calendar.db")]
    database: String,

    /// Path to the 32-byte Ed25519 signing key seed
    #[arg(long, env = "CAL_SIGNING_KEY_PATH")]
    signing_key: Option<String>,

    /// Stack identifier written into every block
    #[arg(long, env = "CAL_STACK_ID", default_value = "calendar-local")]
    stack_id: String,

    /// Public base URI of this calendar stack
    #[arg(long, env = "CAL_STACK_URI", default_value = "http://localhost:3000")]
    stack_uri: String,

    /// Log level
    #[arg(long, env = "CAL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Verify every stored block's hash, link and signature before starting
    #[arg(long, default_value = "false")]
    verify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting calendar-server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();
    config.database_path = args.database;
    config.signing_key_path = args.signing_key;
    config.stack_id = args.stack_id;
    config.stack_uri = args.stack_uri.trim_end_matches('/').to_string();
    config.log_level = args.log_level;

    let signer = match &config.signing_key_path {
        Some(path) => BlockSigner::from_file(path)
            .with_context(|| format!("failed to load signing key from {}", path))?,
        None => {
            tracing::warn!("No signing key configured, using an ephemeral key");
            BlockSigner::generate()
        }
    };
    tracing::info!(key_id = %signer.key_id(), "Signing key loaded");

    let store = Arc::new(
        SqliteBlockStore::new(&config.database_path)
            .with_context(|| format!("failed to open database {}", config.database_path))?,
    );
    let calendar = Arc::new(CalendarChain::new(store.clone(), signer, config.stack_id.clone()));

    if args.verify {
        if let Some(tip) = calendar.latest()? {
            let verified = calendar
                .verify_chain(0, tip.height)
                .context("calendar verification failed")?;
            tracing::info!(blocks = verified, "Calendar verified");
        }
    }

    let lock = Arc::new(
        SqliteLockService::open(&config.database_path).context("failed to open lock table")?,
    );
    let scheduler = LockScheduler::new(lock, config.lock.clone());
    tracing::info!(holder = %scheduler.holder(), "Lock scheduler ready");

    match ensure_genesis(&calendar, &scheduler).await? {
        Some(genesis) => tracing::info!(hash = %genesis.hash, "Calendar genesis present"),
        None => tracing::warn!("Genesis lock busy, another replica is initializing the calendar"),
    }

    let stats = store.stats()?;
    tracing::info!(
        blocks = stats.block_count,
        schema_version = store.schema_version()?,
        "Calendar ledger opened"
    );

    let (broker, events) = ChannelBroker::new();
    // Beacon feed; fed by the beacon poller when one is attached
    let (_beacon_tx, beacon_rx) = watch::channel(None);

    let runner = BackgroundJobRunner::new(
        calendar,
        broker,
        scheduler,
        beacon_rx,
        config.stack_uri.clone(),
        config.background.clone(),
    );
    let handles = runner.start(events).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    runner.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Background job ended abnormally");
        }
    }

    tracing::info!("calendar-server stopped");
    Ok(())
}
