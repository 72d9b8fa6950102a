//! Platform model and capability profiles
//!
//! The set of publishing targets is closed: every platform Syndica can post to
//! is a variant of [`Platform`], and each variant carries a declarative
//! [`PlatformProfile`] describing its limits and formatting rules. Content
//! rendering and validation are pure functions of the item and the profile;
//! the network side lives behind [`crate::adapters::PlatformAdapter`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ContentItem;

/// A publishing target known to Syndica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Facebook,
    Instagram,
    Tiktok,
}

impl Platform {
    /// All known platforms, in a stable order.
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Tiktok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "twitter" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid options: twitter, facebook, instagram, tiktok",
                s
            )),
        }
    }
}

/// Declarative capability descriptor for one platform.
///
/// Profiles start from built-in defaults and may be overridden from the
/// config file. Formatting never silently drops required content: a platform
/// that mandates an image rejects imageless items in [`validate`](Self::validate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub enabled: bool,
    pub char_limit: usize,
    pub hashtag_limit: usize,
    pub image_aspect_ratio: String,
    pub supports_video: bool,
    pub supports_carousel: bool,
    pub requires_image: bool,
    pub rate_limit_per_hour: u32,
    /// High-engagement UTC hours, ordered by preference.
    pub optimal_hours: Vec<u32>,
}

impl PlatformProfile {
    /// Built-in default profile for a platform.
    pub fn default_for(platform: Platform) -> Self {
        match platform {
            Platform::Twitter => Self {
                enabled: true,
                char_limit: 280,
                hashtag_limit: 5,
                image_aspect_ratio: "16:9".to_string(),
                supports_video: true,
                supports_carousel: false,
                requires_image: false,
                rate_limit_per_hour: 25,
                optimal_hours: vec![12, 15, 18, 21],
            },
            Platform::Facebook => Self {
                enabled: true,
                char_limit: 2000,
                hashtag_limit: 10,
                image_aspect_ratio: "1.91:1".to_string(),
                supports_video: true,
                supports_carousel: true,
                requires_image: false,
                rate_limit_per_hour: 15,
                optimal_hours: vec![13, 16, 19],
            },
            Platform::Instagram => Self {
                enabled: true,
                char_limit: 2200,
                hashtag_limit: 30,
                image_aspect_ratio: "1:1".to_string(),
                supports_video: true,
                supports_carousel: true,
                requires_image: true,
                rate_limit_per_hour: 10,
                optimal_hours: vec![11, 14, 17, 20],
            },
            Platform::Tiktok => Self {
                enabled: true,
                char_limit: 2200,
                hashtag_limit: 8,
                image_aspect_ratio: "9:16".to_string(),
                supports_video: true,
                supports_carousel: false,
                requires_image: false,
                rate_limit_per_hour: 10,
                optimal_hours: vec![16, 19, 22],
            },
        }
    }

    /// Render an item for this platform.
    ///
    /// The body is truncated to fit the character limit; the link and the
    /// hashtags (in their original order) are always kept intact.
    pub fn format(&self, item: &ContentItem) -> String {
        let mut suffix = String::new();
        if let Some(link) = &item.link {
            suffix.push('\n');
            suffix.push_str(link);
        }
        let tags: Vec<String> = item
            .hashtags
            .iter()
            .take(self.hashtag_limit)
            .map(|t| format!("#{}", t.trim_start_matches('#')))
            .collect();
        if !tags.is_empty() {
            suffix.push('\n');
            suffix.push_str(&tags.join(" "));
        }

        let suffix_len = suffix.chars().count();
        let body_len = item.body.chars().count();

        if body_len + suffix_len <= self.char_limit {
            return format!("{}{}", item.body, suffix);
        }

        let budget = self.char_limit.saturating_sub(suffix_len + 3);
        let truncated: String = item.body.chars().take(budget).collect();
        format!("{}...{}", truncated.trim_end(), suffix)
    }

    /// Validate an item against this profile.
    ///
    /// Returns all violations rather than stopping at the first one.
    pub fn validate(&self, item: &ContentItem) -> ContentCheck {
        let mut errors = Vec::new();

        if item.body.trim().is_empty() {
            errors.push("Content body is empty".to_string());
        }

        if item.hashtags.len() > self.hashtag_limit {
            errors.push(format!(
                "Too many hashtags: {} (limit {})",
                item.hashtags.len(),
                self.hashtag_limit
            ));
        }

        let rendered = self.format(item);
        let rendered_len = rendered.chars().count();
        if rendered_len > self.char_limit {
            errors.push(format!(
                "Formatted content exceeds {} character limit ({} characters)",
                self.char_limit, rendered_len
            ));
        }

        if self.requires_image && item.image_url.is_none() {
            errors.push("Platform requires an image and none was supplied".to_string());
        }

        ContentCheck {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Result of validating content against a platform profile.
#[derive(Debug, Clone)]
pub struct ContentCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}
