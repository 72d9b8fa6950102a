//! Per-platform posting rate limits
//!
//! Limits are evaluated over a trailing 60-minute window of successful posts
//! in the post log. Skips and failures never consume budget.

use std::collections::HashMap;

use crate::error::Result;
use crate::platform::Platform;
use crate::store::Store;

const WINDOW_SECS: i64 = 3600;

/// Answer from a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStatus {
    pub allowed: bool,
    /// Posts left in the current window.
    pub remaining: u32,
    /// Timestamp when the window has certainly rolled over.
    pub reset_at: i64,
}

pub struct RateLimitTracker {
    limits: HashMap<Platform, u32>,
}

impl RateLimitTracker {
    pub fn new(limits: HashMap<Platform, u32>) -> Self {
        Self { limits }
    }

    pub fn limit_for(&self, platform: Platform) -> u32 {
        self.limits.get(&platform).copied().unwrap_or(0)
    }

    /// Check whether a post to `platform` is currently within budget.
    pub async fn status(&self, store: &Store, platform: Platform, now: i64) -> Result<RateStatus> {
        let limit = self.limit_for(platform);
        let used = store
            .count_successes_since(platform, now - WINDOW_SECS)
            .await?;
        let remaining = limit.saturating_sub(used);

        Ok(RateStatus {
            allowed: remaining > 0,
            remaining,
            reset_at: now + WINDOW_SECS,
        })
    }
}
