//! syndica-send - Queue processor for scheduled posting
//!
//! Runs one processing pass over due items, or polls in a loop. Each pass
//! claims due items, attempts their target platforms, and settles statuses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use libsyndica::adapters::{AdapterRegistry, MockAdapter};
use libsyndica::clock::SystemClock;
use libsyndica::config::resolve_config_path;
use libsyndica::image::NoImageResolver;
use libsyndica::queue::ContentQueueManager;
use libsyndica::types::ProcessSummary;
use libsyndica::{Config, Platform, Result, SyndicaError};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "syndica-send")]
#[command(version)]
#[command(about = "Queue processor for scheduled posting")]
#[command(long_about = "\
syndica-send - Queue processor for scheduled posting

DESCRIPTION:
    Processes the Syndica content queue: selects due pending items in
    priority order, gates each target platform on rate limits and duplicate
    content, publishes through the configured adapters, and records
    per-platform results. Failed items retry on later passes until their
    retry budget is spent.

    Run with --once from cron or a systemd timer, or without it to poll in
    a loop. Invocations must not overlap; the pending->processing claim
    protects individual items, not whole passes.

USAGE:
    # One pass, then exit
    syndica-send --once

    # Poll every 60 seconds
    syndica-send

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current pass)

CONFIGURATION:
    Configuration file: ~/.config/syndica/config.toml
    Database location:  ~/.local/share/syndica/queue.db
    Override with SYNDICA_CONFIG.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Process due items once and exit
    #[arg(long)]
    once: bool,

    /// Maximum items to claim per pass
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    poll_interval: u64,

    /// Print each pass summary as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    libsyndica::logging::init_cli(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let registry = build_registry(&config);

    let manager = ContentQueueManager::from_config(
        &config,
        registry,
        Arc::new(NoImageResolver),
        Arc::new(SystemClock),
    )
    .await?;

    info!("syndica-send starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    if cli.once {
        let summary = manager.process_queue(cli.limit).await?;
        report(&summary, cli.json);
    } else {
        info!(poll_interval = cli.poll_interval, "polling");
        run_loop(&manager, &cli, shutdown).await?;
    }

    info!("syndica-send stopped");
    Ok(())
}

fn load_config() -> Result<Config> {
    let path = resolve_config_path()?;
    if path.exists() {
        Config::load_from_path(&path)
    } else {
        Ok(Config::default_config())
    }
}

/// Adapters for every enabled platform. Real platform integrations register
/// here; this crate ships only the recording adapter, so a pass exercises
/// the full queue machinery without touching external APIs.
fn build_registry(config: &Config) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for platform in Platform::ALL {
        if config.profile(platform).enabled {
            registry.register(Arc::new(MockAdapter::new(platform)));
        }
    }
    registry
}

fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| SyndicaError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

async fn run_loop(
    manager: &ContentQueueManager,
    cli: &Cli,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping");
            break;
        }

        match manager.process_queue(cli.limit).await {
            Ok(summary) => {
                if summary.processed > 0 {
                    report(&summary, cli.json);
                }
            }
            // Storage failures are logged and the loop keeps polling
            Err(e) => error!("queue pass failed: {}", e),
        }

        // Sleep until the next poll, checking for shutdown every second
        for _ in 0..cli.poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(())
}

fn report(summary: &ProcessSummary, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string(summary).unwrap_or_default()
        );
    } else if summary.processed > 0 {
        println!(
            "processed {} item(s): {} posted, {} failed, {} deferred",
            summary.processed, summary.succeeded, summary.failed, summary.deferred
        );
    } else {
        println!("nothing due");
    }
}
