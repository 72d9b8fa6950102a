//! Core types for Syndica

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::platform::Platform;

/// Kind of schedulable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Deal,
    Guide,
    Social,
    Blog,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Deal => "deal",
            ContentType::Guide => "guide",
            ContentType::Social => "social",
            ContentType::Blog => "blog",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deal" => Ok(ContentType::Deal),
            "guide" => Ok(ContentType::Guide),
            "social" => Ok(ContentType::Social),
            "blog" => Ok(ContentType::Blog),
            _ => Err(format!(
                "Unknown content type: '{}'. Valid options: deal, guide, social, blog",
                s
            )),
        }
    }
}

/// Queue item lifecycle state.
///
/// `Posted` and `Cancelled` are terminal. `Failed` is terminal for the
/// processor but can be re-armed via `retry_failed` while retries remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Posted,
    Failed,
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Posted => "posted",
            ItemStatus::Failed => "failed",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Posted | ItemStatus::Cancelled | ItemStatus::Failed
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "posted" => Ok(ItemStatus::Posted),
            "failed" => Ok(ItemStatus::Failed),
            "cancelled" => Ok(ItemStatus::Cancelled),
            _ => Err(format!("Unknown item status: '{}'", s)),
        }
    }
}

/// Why a platform attempt was skipped rather than executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    RateLimited,
    DuplicateContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RateLimited => write!(f, "Rate limited"),
            SkipReason::DuplicateContent => write!(f, "Duplicate content"),
        }
    }
}

/// Per-platform outcome of a processing pass, folded into
/// [`ContentItem::results`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlatformOutcome {
    Success {
        post_id: Option<String>,
        url: Option<String>,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

impl PlatformOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PlatformOutcome::Success { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, PlatformOutcome::Skipped { .. })
    }
}

/// One unit of schedulable content targeting one or more platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub item_type: ContentType,
    pub title: String,
    pub body: String,
    /// Target platforms, processed in list order. Non-empty by construction.
    pub platforms: Vec<Platform>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    /// Display order matters; preserved end to end.
    pub hashtags: Vec<String>,
    pub product_type: Option<String>,
    pub product_data: Option<serde_json::Value>,
    /// Eligible for processing once now >= scheduled_at. Set once at creation.
    pub scheduled_at: i64,
    /// Informational only, used for human-readable scheduling explanations.
    pub timezone: String,
    /// 0-10, higher is processed first among due items.
    pub priority: u8,
    pub status: ItemStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub results: BTreeMap<Platform, PlatformOutcome>,
    pub error: Option<String>,
    pub created_at: i64,
    pub posted_at: Option<i64>,
}

impl ContentItem {
    /// Minimal pending item for tests.
    #[doc(hidden)]
    pub fn test_stub(item_type: ContentType, body: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item_type,
            title: "test".to_string(),
            body: body.to_string(),
            platforms: vec![Platform::Twitter],
            image_url: None,
            link: None,
            hashtags: Vec::new(),
            product_type: None,
            product_data: None,
            scheduled_at: 0,
            timezone: "UTC".to_string(),
            priority: 5,
            status: ItemStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            results: BTreeMap::new(),
            error: None,
            created_at: 0,
            posted_at: None,
        }
    }
}

/// Caller-supplied fields for a new queue item; everything else is filled in
/// by [`crate::queue::ContentQueueManager::enqueue`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentDraft {
    pub item_type: Option<ContentType>,
    pub title: String,
    pub body: String,
    pub platforms: Vec<Platform>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub hashtags: Vec<String>,
    pub product_type: Option<String>,
    pub product_data: Option<serde_json::Value>,
    /// Unix timestamp; when absent the scheduler agent proposes one.
    pub scheduled_at: Option<i64>,
    pub timezone: Option<String>,
    pub priority: Option<u8>,
    pub max_retries: Option<u32>,
}

/// Proposal returned by the scheduler agent. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleProposal {
    pub scheduled_at: i64,
    pub timezone: String,
    /// 0-100 heuristic, used only for relative ordering among candidates.
    pub score: f64,
    pub reason: String,
}

/// Counts returned by `stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub posted: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Pending items per target platform; an item targeting N platforms
    /// contributes to N buckets.
    pub pending_by_platform: BTreeMap<Platform, u64>,
}

/// Per-item detail in a [`ProcessSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub id: String,
    pub status: ItemStatus,
    pub outcomes: BTreeMap<Platform, PlatformOutcome>,
}

/// Batch summary returned by one `process_queue` pass.
///
/// Individual platform failures never surface as errors; they are folded in
/// here. `deferred` counts items that went back to pending (retry or skips).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub deferred: usize,
    pub items: Vec<ItemReport>,
}
