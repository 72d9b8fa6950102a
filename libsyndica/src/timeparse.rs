//! Human-readable schedule parsing for the CLI
//!
//! Accepts relative durations ("1h", "30m"), natural language ("tomorrow",
//! "next monday 10am"), and absolute times ("2026-09-01 15:00"). The parsed
//! time is anchored to the provided `now` so callers with an injected clock
//! stay deterministic.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SyndicaError};

/// Parse a schedule string into a UTC time.
///
/// # Errors
///
/// Returns `InvalidInput` when the string matches none of the supported
/// formats or the result is in the past.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SyndicaError::InvalidInput(
            "schedule string cannot be empty".to_string(),
        ));
    }

    let parsed = if let Some(duration) = parse_duration(input) {
        now + duration
    } else if let Ok(dt) =
        chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
    {
        dt
    } else {
        return Err(SyndicaError::InvalidInput(format!(
            "could not parse schedule string: {}",
            input
        )));
    };

    if parsed < now {
        return Err(SyndicaError::InvalidInput(format!(
            "schedule time is in the past: {}",
            parsed.format("%Y-%m-%d %H:%M UTC")
        )));
    }

    Ok(parsed)
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::try_seconds(std_duration.as_secs() as i64)
}
