//! Time-window bound parsing.
//!
//! Accepts relative offsets (`7d`, `24h`, `30m`, `1w`), ISO 8601 date-times
//! with or without an offset, and bare calendar dates. All values resolve to
//! milliseconds since the Unix epoch.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::{MinerError, Result};

static RELATIVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(\d+)([dhwm])$").expect("valid regex"));

/// Parse a timestamp relative to `now`.
pub fn parse_timestamp(input: &str, now: DateTime<Utc>) -> Result<i64> {
    let trimmed = input.trim();
    let invalid = || MinerError::InvalidTimestamp {
        input: input.to_string(),
    };

    if let Some(caps) = RELATIVE_REGEX.captures(trimmed) {
        let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
        let offset = match caps[2].to_ascii_lowercase().as_str() {
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            "w" => Duration::try_weeks(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        let at = now.checked_sub_signed(offset).ok_or_else(invalid)?;
        return Ok(at.timestamp_millis());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(midnight.and_utc().timestamp_millis());
    }

    Err(invalid())
}

/// Inclusive creation-time window, in epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

impl TimeWindow {
    #[must_use]
    pub const fn new(from_ms: Option<i64>, to_ms: Option<i64>) -> Self {
        Self { from_ms, to_ms }
    }

    /// Parse optional bounds; any unparsable bound fails before work starts.
    pub fn parse(from: Option<&str>, to: Option<&str>, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            from_ms: from.map(|v| parse_timestamp(v, now)).transpose()?,
            to_ms: to.map(|v| parse_timestamp(v, now)).transpose()?,
        })
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from_ms.is_none() && self.to_ms.is_none()
    }

    /// Whether a creation time falls inside the window.
    ///
    /// Items without a creation time are kept.
    #[must_use]
    pub fn contains(&self, created_ms: Option<i64>) -> bool {
        let Some(created) = created_ms else {
            return true;
        };
        if self.from_ms.is_some_and(|from| created < from) {
            return false;
        }
        if self.to_ms.is_some_and(|to| created > to) {
            return false;
        }
        true
    }
}
