//! Optimal posting-time proposals
//!
//! The scheduler scores a bounded set of candidate timestamps against
//! engagement heuristics and the current queue state, and proposes the best
//! one. It is deterministic: identical inputs (current time, queue contents,
//! request) always yield the same proposal. Scores only order candidates
//! relative to each other; they carry no absolute meaning.

use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc, Weekday};
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;
use crate::platform::{Platform, PlatformProfile};
use crate::rate_limit::RateLimitTracker;
use crate::store::Store;
use crate::types::{ContentType, ScheduleProposal};

const MAX_CANDIDATES: usize = 20;
const FALLBACK_SLOT_HOURS: i64 = 6;
const CONGESTION_HALF_WINDOW_SECS: i64 = 1800;
const RATE_LIMITED_SCORE: f64 = 25.0;

/// Audience timezones the scorer tracks: fixed UTC offsets with estimated
/// audience share. Standard-time offsets are close enough for a heuristic;
/// real DST handling is not worth a timezone database here.
const AUDIENCE_ZONES: &[(&str, i32, f64)] = &[
    ("America/New_York", -5, 0.35),
    ("Europe/London", 0, 0.25),
    ("Europe/Berlin", 1, 0.20),
    ("Asia/Singapore", 8, 0.20),
];

#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub platform: Platform,
    pub content_type: ContentType,
    pub priority: Option<u8>,
    pub timezone: Option<String>,
    /// UTC hour the caller would like, boosts matching candidates.
    pub preferred_hour: Option<u32>,
    pub min_delay_minutes: Option<i64>,
}

impl ScheduleRequest {
    pub fn new(platform: Platform, content_type: ContentType) -> Self {
        Self {
            platform,
            content_type,
            priority: None,
            timezone: None,
            preferred_hour: None,
            min_delay_minutes: None,
        }
    }
}

pub struct SchedulerAgent {
    store: Store,
    rate_tracker: Arc<RateLimitTracker>,
    clock: Arc<dyn Clock>,
    profiles: HashMap<Platform, PlatformProfile>,
    default_min_delay_minutes: i64,
}

impl SchedulerAgent {
    pub fn new(
        store: Store,
        rate_tracker: Arc<RateLimitTracker>,
        clock: Arc<dyn Clock>,
        profiles: HashMap<Platform, PlatformProfile>,
        default_min_delay_minutes: i64,
    ) -> Self {
        Self {
            store,
            rate_tracker,
            clock,
            profiles,
            default_min_delay_minutes,
        }
    }

    fn profile(&self, platform: Platform) -> PlatformProfile {
        self.profiles
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformProfile::default_for(platform))
    }

    /// Propose the best posting time for the request.
    pub async fn get_optimal_time(&self, request: &ScheduleRequest) -> Result<ScheduleProposal> {
        let now = self.clock.now_ts();
        let timezone = request
            .timezone
            .clone()
            .unwrap_or_else(|| "UTC".to_string());

        // Rate-limited platforms get the window rollover time directly, with
        // a low fixed confidence.
        let rate = self
            .rate_tracker
            .status(&self.store, request.platform, now)
            .await?;
        if !rate.allowed {
            return Ok(ScheduleProposal {
                scheduled_at: rate.reset_at,
                timezone,
                score: RATE_LIMITED_SCORE,
                reason: format!(
                    "{} is rate limited; deferring to the next window",
                    request.platform
                ),
            });
        }

        let profile = self.profile(request.platform);
        let min_delay = request
            .min_delay_minutes
            .unwrap_or(self.default_min_delay_minutes);
        let earliest = now + min_delay * 60;

        let candidates = generate_candidates(now, earliest, &profile.optimal_hours);

        let mut best: Option<(i64, f64)> = None;
        for &candidate in &candidates {
            let congestion = self
                .store
                .count_pending_near(request.platform, candidate, CONGESTION_HALF_WINDOW_SECS)
                .await?;
            let score = score_candidate(candidate, now, request, &profile, congestion);
            // Strictly-greater keeps the earliest candidate on ties
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }

        // Candidate generation always yields at least the fallback slots
        let (scheduled_at, score) = best.unwrap_or((earliest, RATE_LIMITED_SCORE));

        Ok(ScheduleProposal {
            scheduled_at,
            timezone,
            score,
            reason: describe(scheduled_at, score, &profile),
        })
    }
}

/// Candidate slots: the platform's optimal hours over today and the next two
/// days, then hourly fallback slots over the next few hours. Earliest-first
/// within each list, deduplicated, capped.
fn generate_candidates(now: i64, earliest: i64, optimal_hours: &[u32]) -> Vec<i64> {
    let now_dt = Utc
        .timestamp_opt(now, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let today = now_dt.date_naive();

    let mut candidates: Vec<i64> = Vec::new();

    for day_offset in 0..3 {
        let date = today + ChronoDuration::days(day_offset);
        for &hour in optimal_hours {
            if let Some(naive) = date.and_hms_opt(hour, 0, 0) {
                let ts = Utc.from_utc_datetime(&naive).timestamp();
                if ts >= earliest {
                    candidates.push(ts);
                }
            }
        }
    }

    // Hourly fallbacks, floored to the hour, so there is always daytime
    // coverage even when optimal hours align badly with `now`.
    let next_hour = (earliest / 3600 + 1) * 3600;
    for i in 0..FALLBACK_SLOT_HOURS {
        candidates.push(next_hour + i * 3600);
    }

    candidates.sort_unstable();
    candidates.dedup();
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

fn day_multiplier(weekday: Weekday) -> f64 {
    match weekday {
        Weekday::Thu => 1.15,
        Weekday::Tue | Weekday::Wed => 1.10,
        Weekday::Mon => 1.05,
        Weekday::Fri => 0.95,
        Weekday::Sat => 0.90,
        Weekday::Sun => 0.85,
    }
}

fn timezone_coverage(utc_hour: u32) -> f64 {
    let mut coverage = 0.0;
    for &(_, offset, weight) in AUDIENCE_ZONES {
        let local = (utc_hour as i32 + offset).rem_euclid(24) as u32;
        let good = matches!(local, 8..=10 | 12..=14 | 17..=21);
        if good {
            coverage += weight;
        }
    }
    coverage
}

fn content_affinity(content_type: ContentType, utc_hour: u32) -> f64 {
    match content_type {
        ContentType::Deal if (17..=22).contains(&utc_hour) => 10.0,
        ContentType::Blog if (13..=15).contains(&utc_hour) => 10.0,
        _ => 0.0,
    }
}

fn score_candidate(
    candidate: i64,
    now: i64,
    request: &ScheduleRequest,
    profile: &PlatformProfile,
    congestion: u32,
) -> f64 {
    let dt = match Utc.timestamp_opt(candidate, 0).single() {
        Some(dt) => dt,
        None => return 0.0,
    };
    let hour = dt.hour();

    let mut score = 50.0;

    if profile.optimal_hours.contains(&hour) {
        score += 20.0;
    }

    score *= day_multiplier(dt.weekday());

    score += timezone_coverage(hour) * 10.0;

    score -= 5.0 * congestion as f64;

    score += request.priority.unwrap_or(0) as f64 * 2.0;

    score += content_affinity(request.content_type, hour);

    // Prefer sooner, all else equal
    let lead = candidate - now;
    if lead <= 24 * 3600 {
        score += 5.0;
    } else if lead > 48 * 3600 {
        score -= 5.0;
    }

    if request.preferred_hour == Some(hour) {
        score *= 1.2;
    }

    score.clamp(0.0, 100.0)
}

fn describe(scheduled_at: i64, score: f64, profile: &PlatformProfile) -> String {
    let quality = if score >= 80.0 {
        "excellent"
    } else if score >= 60.0 {
        "good"
    } else if score >= 40.0 {
        "acceptable"
    } else {
        "sub-optimal"
    };

    let hour = Utc
        .timestamp_opt(scheduled_at, 0)
        .single()
        .map(|dt| dt.hour());
    let optimal = hour.map(|h| profile.optimal_hours.contains(&h)).unwrap_or(false);

    if optimal {
        format!("{} slot at a platform-optimal hour", quality)
    } else {
        format!("{} slot outside platform-optimal hours", quality)
    }
}
