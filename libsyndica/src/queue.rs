//! Content queue manager
//!
//! Owns the item lifecycle: `pending -> processing -> posted | pending
//! (retry) | failed`, with explicit cancel from either active state. All
//! collaborators (store, adapters, scheduler, clock) are injected; nothing
//! here reads ambient state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{publish_with_retry, AdapterRegistry};
use crate::clock::Clock;
use crate::config::Config;
use crate::dedup::DuplicateDetector;
use crate::error::{Result, SyndicaError};
use crate::image::ImageResolver;
use crate::platform::{Platform, PlatformProfile};
use crate::rate_limit::RateLimitTracker;
use crate::scheduler::{ScheduleRequest, SchedulerAgent};
use crate::store::{PostLogEntry, Store};
use crate::types::{
    ContentDraft, ContentItem, ContentType, ItemReport, ItemStatus, PlatformOutcome,
    ProcessSummary, QueueStats, SkipReason,
};

const MAX_PRIORITY: u8 = 10;

/// Tunables for the queue manager, usually derived from
/// [`crate::config::QueueConfig`].
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Inter-platform pacing within one item. Request hygiene, not a rate
    /// limit.
    pub pacing: Duration,
    pub default_max_retries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(2),
            default_max_retries: 3,
        }
    }
}

pub struct ContentQueueManager {
    store: Store,
    adapters: AdapterRegistry,
    scheduler: SchedulerAgent,
    rate_tracker: Arc<RateLimitTracker>,
    dedup: DuplicateDetector,
    image_resolver: Arc<dyn ImageResolver>,
    clock: Arc<dyn Clock>,
    profiles: HashMap<Platform, PlatformProfile>,
    settings: QueueSettings,
}

impl ContentQueueManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        adapters: AdapterRegistry,
        scheduler: SchedulerAgent,
        rate_tracker: Arc<RateLimitTracker>,
        dedup: DuplicateDetector,
        image_resolver: Arc<dyn ImageResolver>,
        clock: Arc<dyn Clock>,
        profiles: HashMap<Platform, PlatformProfile>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            store,
            adapters,
            scheduler,
            rate_tracker,
            dedup,
            image_resolver,
            clock,
            profiles,
            settings,
        }
    }

    /// Wire up a manager from configuration with the standard collaborators.
    /// Used by the binaries; tests inject everything by hand.
    pub async fn from_config(
        config: &Config,
        adapters: AdapterRegistry,
        image_resolver: Arc<dyn ImageResolver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Store::new(&config.database.path).await?;
        let rate_tracker = Arc::new(RateLimitTracker::new(config.rate_limits()));
        let profiles: HashMap<Platform, PlatformProfile> = Platform::ALL
            .iter()
            .map(|p| (*p, config.profile(*p)))
            .collect();

        let scheduler = SchedulerAgent::new(
            store.clone(),
            rate_tracker.clone(),
            clock.clone(),
            profiles.clone(),
            config.scheduler.min_delay_minutes,
        );

        let settings = QueueSettings {
            pacing: Duration::from_millis(config.queue.pacing_ms),
            default_max_retries: config.queue.default_max_retries,
        };

        Ok(Self::new(
            store,
            adapters,
            scheduler,
            rate_tracker,
            DuplicateDetector::new(config.queue.duplicate_window_hours),
            image_resolver,
            clock,
            profiles,
            settings,
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn scheduler(&self) -> &SchedulerAgent {
        &self.scheduler
    }

    fn profile(&self, platform: Platform) -> PlatformProfile {
        self.profiles
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformProfile::default_for(platform))
    }

    /// Create a pending item from a draft and return its id.
    ///
    /// Fills in what the caller omitted: the scheduler proposes a posting
    /// time, the image resolver supplies a product image, priority is
    /// clamped to 0-10.
    pub async fn enqueue(&self, draft: ContentDraft) -> Result<String> {
        if draft.platforms.is_empty() {
            return Err(SyndicaError::InvalidInput(
                "at least one target platform is required".to_string(),
            ));
        }
        if draft.body.trim().is_empty() {
            return Err(SyndicaError::InvalidInput(
                "content body must not be empty".to_string(),
            ));
        }

        let now = self.clock.now_ts();
        let item_type = draft.item_type.unwrap_or(ContentType::Social);
        let priority = draft.priority.unwrap_or(5).min(MAX_PRIORITY);

        let (scheduled_at, timezone) = match draft.scheduled_at {
            Some(ts) => (
                ts,
                draft.timezone.clone().unwrap_or_else(|| "UTC".to_string()),
            ),
            None => {
                let request = ScheduleRequest {
                    platform: draft.platforms[0],
                    content_type: item_type,
                    priority: Some(priority),
                    timezone: draft.timezone.clone(),
                    preferred_hour: None,
                    min_delay_minutes: None,
                };
                let proposal = self.scheduler.get_optimal_time(&request).await?;
                debug!(
                    scheduled_at = proposal.scheduled_at,
                    score = proposal.score,
                    reason = %proposal.reason,
                    "scheduler proposed posting time"
                );
                (proposal.scheduled_at, proposal.timezone)
            }
        };

        let image_url = match (&draft.image_url, &draft.product_type) {
            (Some(url), _) => Some(url.clone()),
            (None, Some(product_type)) => {
                self.image_resolver
                    .resolve(product_type, draft.product_data.as_ref())
                    .await
            }
            (None, None) => None,
        };

        let item = ContentItem {
            id: Uuid::new_v4().to_string(),
            item_type,
            title: draft.title,
            body: draft.body,
            platforms: draft.platforms,
            image_url,
            link: draft.link,
            hashtags: draft.hashtags,
            product_type: draft.product_type,
            product_data: draft.product_data,
            scheduled_at,
            timezone,
            priority,
            status: ItemStatus::Pending,
            retry_count: 0,
            max_retries: draft
                .max_retries
                .unwrap_or(self.settings.default_max_retries),
            results: BTreeMap::new(),
            error: None,
            created_at: now,
            posted_at: None,
        };

        self.store.create_item(&item).await?;
        info!(
            id = %item.id,
            item_type = %item.item_type,
            scheduled_at = item.scheduled_at,
            priority = item.priority,
            "enqueued content item"
        );
        Ok(item.id)
    }

    /// One processing pass: claim up to `limit` due items and attempt their
    /// platforms. Platform failures are folded into the summary; only
    /// storage failures propagate.
    pub async fn process_queue(&self, limit: usize) -> Result<ProcessSummary> {
        let now = self.clock.now_ts();
        let due = self.store.select_due(now, limit).await?;

        let mut summary = ProcessSummary::default();

        for item in due {
            // Conditional claim; a racing processor may have taken it.
            if !self.store.claim(&item.id).await? {
                debug!(id = %item.id, "item claimed elsewhere, skipping");
                continue;
            }
            summary.processed += 1;

            let report = self.process_item(item).await?;
            match report.status {
                ItemStatus::Posted => summary.succeeded += 1,
                ItemStatus::Failed => summary.failed += 1,
                ItemStatus::Pending => summary.deferred += 1,
                // Cancelled mid-pass: counted as processed, nothing more.
                _ => {}
            }
            summary.items.push(report);
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            deferred = summary.deferred,
            "queue pass complete"
        );
        Ok(summary)
    }

    /// Attempt every target platform of one claimed item, in list order,
    /// then settle its status.
    async fn process_item(&self, mut item: ContentItem) -> Result<ItemReport> {
        let platforms = item.platforms.clone();
        let mut first_error: Option<String> = None;
        let mut any_failure = false;

        for (idx, &platform) in platforms.iter().enumerate() {
            // Platforms that already succeeded in an earlier pass stay done.
            if item
                .results
                .get(&platform)
                .map(|r| r.is_success())
                .unwrap_or(false)
            {
                continue;
            }

            let outcome = self.attempt_platform(&item, platform).await?;

            match &outcome {
                PlatformOutcome::Success { .. } => {
                    info!(id = %item.id, platform = %platform, "posted");
                }
                PlatformOutcome::Skipped { reason } => {
                    debug!(id = %item.id, platform = %platform, reason = %reason, "skipped");
                }
                PlatformOutcome::Failed { error } => {
                    any_failure = true;
                    if first_error.is_none() {
                        first_error = Some(error.clone());
                    }
                    warn!(id = %item.id, platform = %platform, error = %error, "post failed");
                }
            }
            let made_call = !outcome.is_skip();
            item.results.insert(platform, outcome);

            // Pace actual API calls; skips cost nothing.
            if made_call && idx + 1 < platforms.len() {
                tokio::time::sleep(self.settings.pacing).await;
            }
        }

        let now = self.clock.now_ts();
        let all_succeeded = item
            .platforms
            .iter()
            .all(|p| item.results.get(p).map(|r| r.is_success()).unwrap_or(false));

        let (status, retry_count, error, posted_at) = if all_succeeded {
            (ItemStatus::Posted, item.retry_count, None, Some(now))
        } else if any_failure {
            // Failures consume a retry; once the budget is spent the item
            // parks as failed.
            let retries = item.retry_count + 1;
            if retries >= item.max_retries {
                (ItemStatus::Failed, retries, first_error, None)
            } else {
                (ItemStatus::Pending, retries, first_error, None)
            }
        } else {
            // Only skips: back to pending without consuming the retry budget.
            (ItemStatus::Pending, item.retry_count, None, None)
        };

        let settled = self
            .store
            .finish_processing(
                &item.id,
                status,
                retry_count,
                &item.results,
                error.as_deref(),
                posted_at,
            )
            .await?;

        // A cancel that landed mid-pass wins; report the item as it is now.
        if !settled {
            let current = self
                .store
                .get_item(&item.id)
                .await?
                .map(|i| i.status)
                .unwrap_or(ItemStatus::Cancelled);
            warn!(id = %item.id, status = current.as_str(), "item left processing mid-pass");
            return Ok(ItemReport {
                id: item.id,
                status: current,
                outcomes: item.results,
            });
        }

        Ok(ItemReport {
            id: item.id,
            status,
            outcomes: item.results,
        })
    }

    /// Gate (rate limit, duplicate, validation) and then publish to one
    /// platform. Never returns platform errors; they become outcomes.
    async fn attempt_platform(
        &self,
        item: &ContentItem,
        platform: Platform,
    ) -> Result<PlatformOutcome> {
        let now = self.clock.now_ts();
        let profile = self.profile(platform);
        let formatted = profile.format(item);

        let rate = self.rate_tracker.status(&self.store, platform, now).await?;
        if !rate.allowed {
            return Ok(PlatformOutcome::Skipped {
                reason: SkipReason::RateLimited,
            });
        }

        if self
            .dedup
            .is_duplicate(&self.store, platform, &formatted, now)
            .await?
        {
            return Ok(PlatformOutcome::Skipped {
                reason: SkipReason::DuplicateContent,
            });
        }

        let check = profile.validate(item);
        if !check.valid {
            return Ok(PlatformOutcome::Failed {
                error: check.errors.join("; "),
            });
        }

        let adapter = match self.adapters.get(platform) {
            Some(adapter) if adapter.is_configured() => adapter,
            _ => {
                return Ok(PlatformOutcome::Failed {
                    error: format!("{} is not configured", platform),
                });
            }
        };

        let outcome = match publish_with_retry(adapter.as_ref(), item, &formatted).await {
            Ok(receipt) => PlatformOutcome::Success {
                post_id: receipt.post_id,
                url: receipt.url,
            },
            Err(e) => PlatformOutcome::Failed {
                error: e.to_string(),
            },
        };

        // Every real attempt lands in the audit log; the rate tracker and
        // duplicate detector read it back.
        let (success, post_id, url, error_message) = match &outcome {
            PlatformOutcome::Success { post_id, url } => {
                (true, post_id.clone(), url.clone(), None)
            }
            PlatformOutcome::Failed { error } => (false, None, None, Some(error.clone())),
            PlatformOutcome::Skipped { .. } => unreachable!("skips return early"),
        };
        self.store
            .record_post_log(&PostLogEntry {
                id: None,
                item_id: item.id.clone(),
                platform,
                success,
                platform_post_id: post_id,
                url,
                error_message,
                content_hash: DuplicateDetector::content_hash(&formatted),
                posted_at: self.clock.now_ts(),
            })
            .await?;

        Ok(outcome)
    }

    /// Cancel an active item. Returns false when the item is terminal or
    /// unknown.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let cancelled = self.store.cancel(id).await?;
        if cancelled {
            info!(id = %id, "cancelled item");
        }
        Ok(cancelled)
    }

    /// Re-arm failed items that still have retry budget. Returns how many
    /// went back to pending.
    pub async fn retry_failed(&self) -> Result<u64> {
        let count = self.store.retry_failed().await?;
        if count > 0 {
            info!(count, "re-armed failed items");
        }
        Ok(count)
    }

    /// Delete posted and cancelled items older than `days`. Failed items
    /// are always kept for inspection.
    pub async fn cleanup(&self, days: i64) -> Result<u64> {
        let cutoff = self.clock.now_ts() - days * 86_400;
        let count = self.store.cleanup_terminal(cutoff).await?;
        if count > 0 {
            info!(count, days, "cleaned up terminal items");
        }
        Ok(count)
    }

    pub async fn get_stats(&self) -> Result<QueueStats> {
        let counts = self.store.count_by_status().await?;
        let get = |s: ItemStatus| counts.get(&s).copied().unwrap_or(0);

        let mut pending_by_platform: BTreeMap<Platform, u64> = BTreeMap::new();
        for item in self.store.pending_items(i64::MAX as usize).await? {
            for platform in item.platforms {
                *pending_by_platform.entry(platform).or_insert(0) += 1;
            }
        }

        Ok(QueueStats {
            pending: get(ItemStatus::Pending),
            processing: get(ItemStatus::Processing),
            posted: get(ItemStatus::Posted),
            failed: get(ItemStatus::Failed),
            cancelled: get(ItemStatus::Cancelled),
            pending_by_platform,
        })
    }

    /// Pending items in schedule order, soonest first.
    pub async fn get_upcoming(&self, limit: usize) -> Result<Vec<ContentItem>> {
        self.store.pending_items(limit).await
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<ContentItem>> {
        self.store.get_item(id).await
    }
}
