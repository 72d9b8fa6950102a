//! syndica-queue - Inspect and manage the content queue

use std::sync::Arc;

use clap::{Parser, Subcommand};
use libsyndica::adapters::AdapterRegistry;
use libsyndica::clock::SystemClock;
use libsyndica::config::resolve_config_path;
use libsyndica::image::NoImageResolver;
use libsyndica::queue::ContentQueueManager;
use libsyndica::types::ContentItem;
use libsyndica::{Config, Result, SyndicaError};

#[derive(Parser, Debug)]
#[command(name = "syndica-queue")]
#[command(version)]
#[command(about = "Inspect and manage the content queue")]
#[command(long_about = "\
syndica-queue - Inspect and manage the content queue

DESCRIPTION:
    Lists upcoming items, cancels or re-arms items, prunes old terminal
    items, and reports queue statistics. Items are published by syndica-send.

COMMANDS:
    upcoming   List pending items in schedule order
    show       Show one item in full
    cancel     Cancel a pending or processing item
    retry      Re-arm failed items that still have retry budget
    cleanup    Delete posted/cancelled items older than N days
    stats      Show per-status and per-platform counts

USAGE EXAMPLES:
    syndica-queue upcoming
    syndica-queue upcoming --limit 5 --format json
    syndica-queue cancel 3f2b7c9a-...
    syndica-queue retry
    syndica-queue cleanup --days 30
    syndica-queue stats --format json

CONFIGURATION:
    Configuration file: ~/.config/syndica/config.toml
    Database location:  ~/.local/share/syndica/queue.db
    Override with SYNDICA_CONFIG.

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Platform not configured
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List pending items in schedule order
    Upcoming {
        /// Maximum number of items to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one item in full
    Show {
        /// Item id
        id: String,
    },

    /// Cancel a pending or processing item
    Cancel {
        /// Item id
        id: String,
    },

    /// Re-arm failed items that still have retry budget
    Retry,

    /// Delete posted/cancelled items older than N days
    Cleanup {
        /// Age cutoff in days
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },

    /// Show per-status and per-platform counts
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
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
    let manager = ContentQueueManager::from_config(
        &config,
        AdapterRegistry::new(),
        Arc::new(NoImageResolver),
        Arc::new(SystemClock),
    )
    .await?;

    match cli.command {
        Commands::Upcoming { limit, format } => cmd_upcoming(&manager, limit, &format).await,
        Commands::Show { id } => cmd_show(&manager, &id).await,
        Commands::Cancel { id } => cmd_cancel(&manager, &id).await,
        Commands::Retry => cmd_retry(&manager).await,
        Commands::Cleanup { days } => cmd_cleanup(&manager, days).await,
        Commands::Stats { format } => cmd_stats(&manager, &format).await,
    }
}

fn load_config() -> Result<Config> {
    let path = resolve_config_path()?;
    if path.exists() {
        Config::load_from_path(&path)
    } else {
        Ok(Config::default_config())
    }
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(SyndicaError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

async fn cmd_upcoming(manager: &ContentQueueManager, limit: usize, format: &str) -> Result<()> {
    validate_format(format)?;
    let items = manager.get_upcoming(limit).await?;

    if format == "json" {
        let json: Vec<serde_json::Value> = items.iter().map(item_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_default()
        );
    } else {
        for item in &items {
            println!(
                "{} | p{} | {} | {} | {}",
                item.id,
                item.priority,
                format_ts(item.scheduled_at),
                platforms_csv(item),
                truncate(&item.body, 50)
            );
        }
    }
    Ok(())
}

async fn cmd_show(manager: &ContentQueueManager, id: &str) -> Result<()> {
    let item = manager
        .get_item(id)
        .await?
        .ok_or_else(|| SyndicaError::InvalidInput(format!("no item with id {}", id)))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&item).unwrap_or_default()
    );
    Ok(())
}

async fn cmd_cancel(manager: &ContentQueueManager, id: &str) -> Result<()> {
    if manager.cancel(id).await? {
        println!("Cancelled {}", id);
        Ok(())
    } else {
        Err(SyndicaError::InvalidInput(format!(
            "item {} is unknown or already terminal",
            id
        )))
    }
}

async fn cmd_retry(manager: &ContentQueueManager) -> Result<()> {
    let count = manager.retry_failed().await?;
    println!("Re-armed {} failed item(s)", count);
    Ok(())
}

async fn cmd_cleanup(manager: &ContentQueueManager, days: i64) -> Result<()> {
    if days < 0 {
        return Err(SyndicaError::InvalidInput(
            "days must be non-negative".to_string(),
        ));
    }
    let count = manager.cleanup(days).await?;
    println!("Removed {} item(s) older than {} days", count, days);
    Ok(())
}

async fn cmd_stats(manager: &ContentQueueManager, format: &str) -> Result<()> {
    validate_format(format)?;
    let stats = manager.get_stats().await?;

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).unwrap_or_default()
        );
    } else {
        println!("pending:    {}", stats.pending);
        println!("processing: {}", stats.processing);
        println!("posted:     {}", stats.posted);
        println!("failed:     {}", stats.failed);
        println!("cancelled:  {}", stats.cancelled);
        if !stats.pending_by_platform.is_empty() {
            println!("pending by platform:");
            for (platform, count) in &stats.pending_by_platform {
                println!("  {}: {}", platform, count);
            }
        }
    }
    Ok(())
}

fn item_json(item: &ContentItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id,
        "type": item.item_type,
        "body": item.body,
        "platforms": item.platforms,
        "scheduled_at": item.scheduled_at,
        "priority": item.priority,
        "status": item.status,
        "retry_count": item.retry_count,
    })
}

fn platforms_csv(item: &ContentItem) -> String {
    item.platforms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Truncate on a char boundary with ellipsis
fn truncate(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
