//! Syndica - multi-platform social content scheduling
//!
//! This library provides the scheduling engine behind the Syndica tools:
//! a persistent content queue with retry and deduplication, per-platform
//! rate limiting, and a heuristic scheduler that proposes optimal posting
//! times.

pub mod adapters;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod image;
pub mod logging;
pub mod platform;
pub mod queue;
pub mod rate_limit;
pub mod scheduler;
pub mod store;
pub mod timeparse;
pub mod types;

// Re-export commonly used types
pub use adapters::{AdapterRegistry, MockAdapter, PlatformAdapter, PublishReceipt};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use dedup::DuplicateDetector;
pub use error::{Result, SyndicaError};
pub use platform::{Platform, PlatformProfile};
pub use queue::{ContentQueueManager, QueueSettings};
pub use rate_limit::{RateLimitTracker, RateStatus};
pub use scheduler::{ScheduleRequest, SchedulerAgent};
pub use store::Store;
pub use types::{
    ContentDraft, ContentItem, ContentType, ItemStatus, PlatformOutcome, ProcessSummary,
    QueueStats, ScheduleProposal,
};
