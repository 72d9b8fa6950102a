//! End-to-end queue processing tests
//!
//! Everything runs against an in-memory store with mock adapters and a
//! fixed clock, so passes are deterministic and fast.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use libsyndica::adapters::mock::MockAdapter;
use libsyndica::adapters::AdapterRegistry;
use libsyndica::clock::FixedClock;
use libsyndica::config::Config;
use libsyndica::dedup::DuplicateDetector;
use libsyndica::error::{PlatformError, SyndicaError};
use libsyndica::image::{ImageResolver, NoImageResolver, StaticImageResolver};
use libsyndica::platform::{Platform, PlatformProfile};
use libsyndica::queue::{ContentQueueManager, QueueSettings};
use libsyndica::rate_limit::RateLimitTracker;
use libsyndica::scheduler::SchedulerAgent;
use libsyndica::store::Store;
use libsyndica::types::{ContentDraft, ContentType, ItemStatus, PlatformOutcome, SkipReason};

// 2026-03-05 12:00:00 UTC, a Thursday.
const NOW: i64 = 1_772_712_000;

struct Harness {
    manager: ContentQueueManager,
    clock: Arc<FixedClock>,
    twitter: Arc<MockAdapter>,
    facebook: Arc<MockAdapter>,
}

async fn harness_with(
    limits: HashMap<Platform, u32>,
    twitter: MockAdapter,
    facebook: MockAdapter,
    resolver: Arc<dyn ImageResolver>,
) -> Harness {
    let store = Store::in_memory().await.unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let rate_tracker = Arc::new(RateLimitTracker::new(limits));

    let config = Config::default_config();
    let profiles: HashMap<Platform, PlatformProfile> = Platform::ALL
        .iter()
        .map(|p| (*p, config.profile(*p)))
        .collect();

    let twitter = Arc::new(twitter);
    let facebook = Arc::new(facebook);
    let mut registry = AdapterRegistry::new();
    registry.register(twitter.clone());
    registry.register(facebook.clone());

    let scheduler = SchedulerAgent::new(
        store.clone(),
        rate_tracker.clone(),
        clock.clone(),
        profiles.clone(),
        10,
    );

    let manager = ContentQueueManager::new(
        store.clone(),
        registry,
        scheduler,
        rate_tracker,
        DuplicateDetector::new(24),
        resolver,
        clock.clone(),
        profiles,
        QueueSettings {
            pacing: Duration::ZERO,
            default_max_retries: 3,
        },
    );

    Harness {
        manager,
        clock,
        twitter,
        facebook,
    }
}

async fn harness() -> Harness {
    harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::new(Platform::Twitter),
        MockAdapter::new(Platform::Facebook),
        Arc::new(NoImageResolver),
    )
    .await
}

fn due_draft(body: &str, platforms: Vec<Platform>, priority: u8) -> ContentDraft {
    ContentDraft {
        item_type: Some(ContentType::Deal),
        title: "Test".to_string(),
        body: body.to_string(),
        platforms,
        priority: Some(priority),
        scheduled_at: Some(NOW - 1),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_deal_posts_to_both_platforms() {
    let h = harness().await;

    let id = h
        .manager
        .enqueue(due_draft(
            "Flight deal: Lisbon from $300",
            vec![Platform::Twitter, Platform::Facebook],
            7,
        ))
        .await
        .unwrap();

    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Posted);
    assert_eq!(item.posted_at, Some(NOW));
    assert!(item.results[&Platform::Twitter].is_success());
    assert!(item.results[&Platform::Facebook].is_success());
    assert_eq!(h.twitter.publish_calls(), 1);
    assert_eq!(h.facebook.publish_calls(), 1);
}

#[tokio::test]
async fn test_priority_order_beats_schedule_order() {
    let h = harness().await;

    let mut low = due_draft("low priority post", vec![Platform::Twitter], 5);
    low.scheduled_at = Some(NOW - 10);
    let low_id = h.manager.enqueue(low).await.unwrap();

    let high = due_draft("high priority post", vec![Platform::Twitter], 8);
    let high_id = h.manager.enqueue(high).await.unwrap();

    let summary = h.manager.process_queue(1).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.items[0].id, high_id);

    let low_item = h.manager.get_item(&low_id).await.unwrap().unwrap();
    assert_eq!(low_item.status, ItemStatus::Pending);
}

#[tokio::test]
async fn test_future_items_never_selected() {
    let h = harness().await;

    let mut draft = due_draft("from the future", vec![Platform::Twitter], 10);
    draft.scheduled_at = Some(NOW + 3600);
    let id = h.manager.enqueue(draft).await.unwrap();

    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.processed, 0);

    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(h.twitter.publish_calls(), 0);
}

#[tokio::test]
async fn test_failed_after_exactly_max_retries_passes() {
    let h = harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::new(Platform::Twitter)
            .fail_times(100, PlatformError::Publish("always rejected".to_string())),
        MockAdapter::new(Platform::Facebook),
        Arc::new(NoImageResolver),
    )
    .await;

    let id = h
        .manager
        .enqueue(due_draft("doomed post", vec![Platform::Twitter], 5))
        .await
        .unwrap();

    // Passes 1 and 2 consume retries and leave the item pending
    for expected_rc in [1, 2] {
        let summary = h.manager.process_queue(10).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.deferred, 1);
        let item = h.manager.get_item(&id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.retry_count, expected_rc);
        h.clock.advance(60);
    }

    // Pass 3 exhausts the budget
    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.failed, 1);
    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.retry_count, 3);
    assert_eq!(item.error.as_deref(), Some("Publishing failed: always rejected"));

    // Pass 4 does not touch the failed item
    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(h.twitter.publish_calls(), 3);
}

#[tokio::test]
async fn test_terminal_items_cannot_be_cancelled() {
    let h = harness().await;

    let id = h
        .manager
        .enqueue(due_draft("post me", vec![Platform::Twitter], 5))
        .await
        .unwrap();
    h.manager.process_queue(10).await.unwrap();

    assert!(!h.manager.cancel(&id).await.unwrap());
    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Posted);
}

#[tokio::test]
async fn test_cancel_pending_item() {
    let h = harness().await;

    let id = h
        .manager
        .enqueue(due_draft("never mind", vec![Platform::Twitter], 5))
        .await
        .unwrap();

    assert!(h.manager.cancel(&id).await.unwrap());
    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Cancelled);

    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(h.twitter.publish_calls(), 0);
}

#[tokio::test]
async fn test_duplicate_content_skipped_without_consuming_retry() {
    let h = harness().await;

    let first = h
        .manager
        .enqueue(due_draft("identical text", vec![Platform::Twitter], 5))
        .await
        .unwrap();
    let second = h
        .manager
        .enqueue(due_draft("identical text", vec![Platform::Twitter], 4))
        .await
        .unwrap();

    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.deferred, 1);

    let posted = h.manager.get_item(&first).await.unwrap().unwrap();
    assert_eq!(posted.status, ItemStatus::Posted);

    let skipped = h.manager.get_item(&second).await.unwrap().unwrap();
    assert_eq!(skipped.status, ItemStatus::Pending);
    assert_eq!(skipped.retry_count, 0);
    assert_eq!(
        skipped.results[&Platform::Twitter],
        PlatformOutcome::Skipped {
            reason: SkipReason::DuplicateContent
        }
    );
    // The adapter was only called for the first item
    assert_eq!(h.twitter.publish_calls(), 1);
}

#[tokio::test]
async fn test_rate_limited_platform_defers_item() {
    let h = harness_with(
        HashMap::from([(Platform::Twitter, 1), (Platform::Facebook, 15)]),
        MockAdapter::new(Platform::Twitter),
        MockAdapter::new(Platform::Facebook),
        Arc::new(NoImageResolver),
    )
    .await;

    let first = h
        .manager
        .enqueue(due_draft("post one", vec![Platform::Twitter], 6))
        .await
        .unwrap();
    let second = h
        .manager
        .enqueue(due_draft("post two", vec![Platform::Twitter], 5))
        .await
        .unwrap();

    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.deferred, 1);

    assert_eq!(
        h.manager.get_item(&first).await.unwrap().unwrap().status,
        ItemStatus::Posted
    );

    let deferred = h.manager.get_item(&second).await.unwrap().unwrap();
    assert_eq!(deferred.status, ItemStatus::Pending);
    assert_eq!(deferred.retry_count, 0);
    assert_eq!(
        deferred.results[&Platform::Twitter],
        PlatformOutcome::Skipped {
            reason: SkipReason::RateLimited
        }
    );

    // An hour later the window has rolled and the second item goes out
    h.clock.advance(3601);
    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(
        h.manager.get_item(&second).await.unwrap().unwrap().status,
        ItemStatus::Posted
    );
}

#[tokio::test]
async fn test_partial_failure_does_not_repost_succeeded_platform() {
    let h = harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::new(Platform::Twitter),
        MockAdapter::new(Platform::Facebook)
            .fail_times(1, PlatformError::Publish("rejected once".to_string())),
        Arc::new(NoImageResolver),
    )
    .await;

    let id = h
        .manager
        .enqueue(due_draft(
            "multi platform post",
            vec![Platform::Twitter, Platform::Facebook],
            5,
        ))
        .await
        .unwrap();

    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.deferred, 1);

    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.retry_count, 1);
    assert!(item.results[&Platform::Twitter].is_success());

    // Next pass only retries facebook; twitter stays posted
    h.clock.advance(60);
    let summary = h.manager.process_queue(10).await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Posted);
    assert!(item.results[&Platform::Facebook].is_success());
    assert_eq!(h.twitter.publish_calls(), 1);
    assert_eq!(h.facebook.publish_calls(), 2);
}

#[tokio::test]
async fn test_unconfigured_platform_fails_item() {
    let h = harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::unconfigured(Platform::Twitter),
        MockAdapter::new(Platform::Facebook),
        Arc::new(NoImageResolver),
    )
    .await;

    let id = h
        .manager
        .enqueue(due_draft("nowhere to go", vec![Platform::Twitter], 5))
        .await
        .unwrap();

    h.manager.process_queue(10).await.unwrap();
    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.retry_count, 1);
    assert!(matches!(
        &item.results[&Platform::Twitter],
        PlatformOutcome::Failed { error } if error.contains("not configured")
    ));
    assert_eq!(h.twitter.publish_calls(), 0);
}

#[tokio::test]
async fn test_retry_failed_rearms_items() {
    let h = harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::new(Platform::Twitter)
            .fail_times(3, PlatformError::Publish("flaky".to_string())),
        MockAdapter::new(Platform::Facebook),
        Arc::new(NoImageResolver),
    )
    .await;

    let mut draft = due_draft("eventually fine", vec![Platform::Twitter], 5);
    draft.max_retries = Some(1);
    let id = h.manager.enqueue(draft).await.unwrap();

    h.manager.process_queue(10).await.unwrap();
    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Failed);

    // retry_count (1) is not below max_retries (1), so nothing to re-arm
    assert_eq!(h.manager.retry_failed().await.unwrap(), 0);
}

#[tokio::test]
async fn test_scheduler_fills_missing_schedule() {
    let h = harness().await;

    let draft = ContentDraft {
        item_type: Some(ContentType::Social),
        title: "t".to_string(),
        body: "no explicit time".to_string(),
        platforms: vec![Platform::Twitter],
        ..Default::default()
    };
    let id = h.manager.enqueue(draft).await.unwrap();

    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    // Proposal respects the 10 minute default minimum delay
    assert!(item.scheduled_at >= NOW + 600);
    assert_eq!(item.status, ItemStatus::Pending);
}

#[tokio::test]
async fn test_enqueue_rejects_bad_drafts() {
    let h = harness().await;

    let no_platforms = ContentDraft {
        body: "text".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        h.manager.enqueue(no_platforms).await,
        Err(SyndicaError::InvalidInput(_))
    ));

    let empty_body = ContentDraft {
        body: "   ".to_string(),
        platforms: vec![Platform::Twitter],
        ..Default::default()
    };
    assert!(matches!(
        h.manager.enqueue(empty_body).await,
        Err(SyndicaError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_enqueue_clamps_priority_and_resolves_image() {
    let resolver =
        StaticImageResolver::default().with("flight_deal", "https://img.example/deal.jpg");
    let h = harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::new(Platform::Twitter),
        MockAdapter::new(Platform::Facebook),
        Arc::new(resolver),
    )
    .await;

    let draft = ContentDraft {
        item_type: Some(ContentType::Deal),
        title: "t".to_string(),
        body: "deal body".to_string(),
        platforms: vec![Platform::Twitter],
        product_type: Some("flight_deal".to_string()),
        priority: Some(200),
        scheduled_at: Some(NOW - 1),
        ..Default::default()
    };
    let id = h.manager.enqueue(draft).await.unwrap();

    let item = h.manager.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.priority, 10);
    assert_eq!(item.image_url.as_deref(), Some("https://img.example/deal.jpg"));
}

#[tokio::test]
async fn test_cleanup_keeps_failed_and_recent() {
    let h = harness_with(
        Config::default_config().rate_limits(),
        MockAdapter::new(Platform::Twitter)
            .fail_times(100, PlatformError::Publish("broken".to_string())),
        MockAdapter::new(Platform::Facebook),
        Arc::new(NoImageResolver),
    )
    .await;

    // A posted item created 40 days ago
    h.clock.set(NOW - 40 * 86_400);
    let mut old_draft = due_draft("old post", vec![Platform::Facebook], 5);
    old_draft.scheduled_at = Some(NOW - 40 * 86_400);
    let old_id = h.manager.enqueue(old_draft).await.unwrap();
    h.manager.process_queue(10).await.unwrap();

    // A failed item, same age
    let mut failed_draft = due_draft("broken post", vec![Platform::Twitter], 5);
    failed_draft.scheduled_at = Some(NOW - 40 * 86_400);
    failed_draft.max_retries = Some(1);
    let failed_id = h.manager.enqueue(failed_draft).await.unwrap();
    h.manager.process_queue(10).await.unwrap();

    // A recent posted item
    h.clock.set(NOW - 10 * 86_400);
    let mut recent_draft = due_draft("recent post", vec![Platform::Facebook], 5);
    recent_draft.scheduled_at = Some(NOW - 10 * 86_400);
    let recent_id = h.manager.enqueue(recent_draft).await.unwrap();
    h.manager.process_queue(10).await.unwrap();

    h.clock.set(NOW);
    let removed = h.manager.cleanup(30).await.unwrap();
    assert_eq!(removed, 1);

    assert!(h.manager.get_item(&old_id).await.unwrap().is_none());
    assert!(h.manager.get_item(&failed_id).await.unwrap().is_some());
    assert!(h.manager.get_item(&recent_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_stats_and_upcoming() {
    let h = harness().await;

    h.manager
        .enqueue(due_draft(
            "two platforms",
            vec![Platform::Twitter, Platform::Facebook],
            5,
        ))
        .await
        .unwrap();

    let mut future = due_draft("later post", vec![Platform::Twitter], 5);
    future.scheduled_at = Some(NOW + 7200);
    h.manager.enqueue(future).await.unwrap();

    let stats = h.manager.get_stats().await.unwrap();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.pending_by_platform[&Platform::Twitter], 2);
    assert_eq!(stats.pending_by_platform[&Platform::Facebook], 1);

    let upcoming = h.manager.get_upcoming(10).await.unwrap();
    assert_eq!(upcoming.len(), 2);
    // Soonest first
    assert!(upcoming[0].scheduled_at <= upcoming[1].scheduled_at);

    h.manager.process_queue(10).await.unwrap();
    let stats = h.manager.get_stats().await.unwrap();
    assert_eq!(stats.posted, 1);
    assert_eq!(stats.pending, 1);
}
