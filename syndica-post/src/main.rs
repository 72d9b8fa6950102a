//! syndica-post - Enqueue content for scheduled posting

use std::io::Read;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use libsyndica::adapters::AdapterRegistry;
use libsyndica::clock::SystemClock;
use libsyndica::config::resolve_config_path;
use libsyndica::image::NoImageResolver;
use libsyndica::queue::ContentQueueManager;
use libsyndica::timeparse::parse_schedule;
use libsyndica::types::{ContentDraft, ContentType};
use libsyndica::{Config, Platform, Result, SyndicaError};

#[derive(Parser, Debug)]
#[command(name = "syndica-post")]
#[command(version)]
#[command(about = "Enqueue content for scheduled posting", long_about = "\
syndica-post - Enqueue content for scheduled posting

DESCRIPTION:
    Creates a pending item in the Syndica content queue. When no --at time
    is given, the scheduler proposes an optimal posting time for the first
    target platform. Items are actually published by syndica-send.

USAGE EXAMPLES:
    # Queue a post for twitter and facebook at the next optimal time
    syndica-post --platforms twitter,facebook \"Flight deal: Lisbon from \\$300\"

    # Explicit schedule, relative or natural language
    syndica-post --platforms twitter --at 2h \"Going live soon\"
    syndica-post --platforms twitter --at \"tomorrow 3pm\" \"Weekly roundup\"

    # A deal with hashtags, a link, and a product image
    syndica-post --platforms instagram --type deal \\
        --hashtags traveldeals,flights --link https://example.com/deal \\
        --product-type flight_deal \"Lisbon from \\$300 round trip\"

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
    /// Content body (reads from stdin if not provided)
    content: Option<String>,

    /// Target platforms (comma-separated: twitter, facebook, instagram, tiktok)
    #[arg(short, long, required = true)]
    platforms: String,

    /// Content type: deal, guide, social, blog
    #[arg(short = 't', long, default_value = "social")]
    r#type: String,

    /// Title for the item (used in listings, not posted)
    #[arg(long, default_value = "")]
    title: String,

    /// Schedule time (e.g. "2h", "tomorrow 3pm"); omit to let the scheduler pick
    #[arg(long)]
    at: Option<String>,

    /// Priority 0-10, higher is processed first
    #[arg(long)]
    priority: Option<u8>,

    /// Comma-separated hashtags (without #)
    #[arg(long)]
    hashtags: Option<String>,

    /// Link to append to the post
    #[arg(long)]
    link: Option<String>,

    /// Image URL to attach
    #[arg(long)]
    image: Option<String>,

    /// Product type for image resolution (e.g. flight_deal)
    #[arg(long)]
    product_type: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
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
    let body = match cli.content {
        Some(content) => content,
        None => read_stdin()?,
    };

    let platforms = parse_platforms(&cli.platforms)?;
    let item_type: ContentType = cli
        .r#type
        .parse()
        .map_err(SyndicaError::InvalidInput)?;

    let scheduled_at = match &cli.at {
        Some(spec) => Some(parse_schedule(spec, Utc::now())?.timestamp()),
        None => None,
    };

    let hashtags = cli
        .hashtags
        .as_deref()
        .map(split_csv)
        .unwrap_or_default();

    let config = load_config()?;
    let manager = ContentQueueManager::from_config(
        &config,
        AdapterRegistry::new(),
        Arc::new(NoImageResolver),
        Arc::new(SystemClock),
    )
    .await?;

    let draft = ContentDraft {
        item_type: Some(item_type),
        title: cli.title,
        body,
        platforms,
        image_url: cli.image,
        link: cli.link,
        hashtags,
        product_type: cli.product_type,
        product_data: None,
        scheduled_at,
        timezone: None,
        priority: cli.priority,
        max_retries: None,
    };

    let id = manager.enqueue(draft).await?;
    let item = manager.get_item(&id).await?.ok_or_else(|| {
        SyndicaError::InvalidInput("item vanished after enqueue".to_string())
    })?;

    if cli.format == "json" {
        let out = serde_json::json!({
            "id": item.id,
            "scheduled_at": item.scheduled_at,
            "timezone": item.timezone,
            "priority": item.priority,
            "platforms": item.platforms,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
    } else {
        let when = chrono::DateTime::from_timestamp(item.scheduled_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| item.scheduled_at.to_string());
        println!("Queued {} for {}", item.id, when);
    }

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

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| SyndicaError::InvalidInput(format!("failed to read stdin: {}", e)))?;
    let trimmed = buffer.trim().to_string();
    if trimmed.is_empty() {
        return Err(SyndicaError::InvalidInput(
            "no content provided on stdin".to_string(),
        ));
    }
    Ok(trimmed)
}

fn parse_platforms(input: &str) -> Result<Vec<Platform>> {
    split_csv(input)
        .iter()
        .map(|s| s.parse::<Platform>().map_err(SyndicaError::InvalidInput))
        .collect()
}

fn split_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
