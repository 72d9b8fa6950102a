//! Configuration management for Syndica

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::platform::{Platform, PlatformProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub twitter: Option<PlatformOverride>,
    pub facebook: Option<PlatformOverride>,
    pub instagram: Option<PlatformOverride>,
    pub tiktok: Option<PlatformOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Delay between platform attempts within one item, request pacing only.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Trailing window for exact-match duplicate suppression.
    #[serde(default = "default_duplicate_window_hours")]
    pub duplicate_window_hours: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            default_max_retries: default_max_retries(),
            duplicate_window_hours: default_duplicate_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum lead time before a proposed slot.
    #[serde(default = "default_min_delay_minutes")]
    pub min_delay_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay_minutes: default_min_delay_minutes(),
        }
    }
}

fn default_pacing_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_duplicate_window_hours() -> i64 {
    24
}

fn default_min_delay_minutes() -> i64 {
    10
}

/// Partial per-platform profile from the config file; unset fields keep the
/// built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformOverride {
    pub enabled: Option<bool>,
    pub char_limit: Option<usize>,
    pub hashtag_limit: Option<usize>,
    pub image_aspect_ratio: Option<String>,
    pub supports_video: Option<bool>,
    pub supports_carousel: Option<bool>,
    pub requires_image: Option<bool>,
    pub rate_limit_per_hour: Option<u32>,
    pub optimal_hours: Option<Vec<u32>>,
}

impl PlatformOverride {
    fn apply(&self, mut profile: PlatformProfile) -> PlatformProfile {
        if let Some(v) = self.enabled {
            profile.enabled = v;
        }
        if let Some(v) = self.char_limit {
            profile.char_limit = v;
        }
        if let Some(v) = self.hashtag_limit {
            profile.hashtag_limit = v;
        }
        if let Some(v) = &self.image_aspect_ratio {
            profile.image_aspect_ratio = v.clone();
        }
        if let Some(v) = self.supports_video {
            profile.supports_video = v;
        }
        if let Some(v) = self.supports_carousel {
            profile.supports_carousel = v;
        }
        if let Some(v) = self.requires_image {
            profile.requires_image = v;
        }
        if let Some(v) = self.rate_limit_per_hour {
            profile.rate_limit_per_hour = v;
        }
        if let Some(v) = &self.optimal_hours {
            profile.optimal_hours = v.clone();
        }
        profile
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/syndica/queue.db".to_string(),
            },
            queue: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
            twitter: None,
            facebook: None,
            instagram: None,
            tiktok: None,
        }
    }

    /// Effective capability profile for a platform: built-in defaults plus
    /// any overrides from the config file.
    pub fn profile(&self, platform: Platform) -> PlatformProfile {
        let base = PlatformProfile::default_for(platform);
        let over = match platform {
            Platform::Twitter => &self.twitter,
            Platform::Facebook => &self.facebook,
            Platform::Instagram => &self.instagram,
            Platform::Tiktok => &self.tiktok,
        };
        match over {
            Some(o) => o.apply(base),
            None => base,
        }
    }

    /// Hourly posting limits for every platform, for the rate tracker.
    pub fn rate_limits(&self) -> std::collections::HashMap<Platform, u32> {
        Platform::ALL
            .iter()
            .map(|p| (*p, self.profile(*p).rate_limit_per_hour))
            .collect()
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICA_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndica").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("syndica"))
}
