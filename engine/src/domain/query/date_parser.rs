//! Relative time expressions
//!
//! Grammar (case-insensitive):
//! - `now`, `today`, `yesterday`, `tomorrow`
//! - absolute ISO 8601 dates and datetimes
//! - `N <unit>[s] ago`, `N <unit>[s] later`, `N <unit>[s] from now`
//! - `last <unit>`, `next <unit>`
//!
//! Offsets in units of a day or longer are anchored at midnight of `now`;
//! shorter offsets are anchored at `now` itself.
//!
//! Time ranges are `<since> : <until>` pairs or one of the shorthands
//! understood by [`get_since_until`].

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;

use crate::core::constants::{NO_TIME_RANGE, TIME_RANGE_SEPARATOR};
use crate::domain::error::ValidationError;
use crate::utils::time::{parse_iso_datetime, start_of_day};

static RE_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+([a-z]+?)s?\s+(ago|later|from now)$").expect("Invalid regex")
});
static RE_DELTA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?\d+)\s+([a-z]+?)s?(\s+ago)?$").expect("Invalid regex")
});
static RE_LAST_NEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(last|next)\s+([a-z]+)$").expect("Invalid regex"));
static RE_LAST_NEXT_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(last|next)\s+(\d+)\s+([a-z]+?)s?$").expect("Invalid regex")
});
static RE_BARE_DELTA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s+[a-z]+$").expect("Invalid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "second" | "sec" => Some(Self::Second),
            "minute" | "min" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// Day and longer offsets anchor at midnight
    fn is_calendar(self) -> bool {
        !matches!(self, Self::Second | Self::Minute | Self::Hour)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        };
        write!(f, "{}", name)
    }
}

/// Signed calendar-aware duration such as "-3 months"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDelta {
    pub amount: i64,
    pub unit: TimeUnit,
}

impl HumanDelta {
    pub fn new(amount: i64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    pub fn negate(self) -> Self {
        Self::new(-self.amount, self.unit)
    }

    /// `dt` moved by this delta; `None` on overflow
    pub fn add_to(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = |n: i64| -> Option<DateTime<Utc>> {
            let m = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
            if n >= 0 {
                dt.checked_add_months(m)
            } else {
                dt.checked_sub_months(m)
            }
        };
        match self.unit {
            TimeUnit::Second => dt.checked_add_signed(Duration::try_seconds(self.amount)?),
            TimeUnit::Minute => dt.checked_add_signed(Duration::try_minutes(self.amount)?),
            TimeUnit::Hour => dt.checked_add_signed(Duration::try_hours(self.amount)?),
            TimeUnit::Day => dt.checked_add_signed(Duration::try_days(self.amount)?),
            TimeUnit::Week => dt.checked_add_signed(Duration::try_weeks(self.amount)?),
            TimeUnit::Month => months(self.amount),
            TimeUnit::Quarter => months(self.amount.checked_mul(3)?),
            TimeUnit::Year => months(self.amount.checked_mul(12)?),
        }
    }
}

impl fmt::Display for HumanDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.amount.abs() == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.amount, self.unit, plural)
    }
}

fn parse_unit(raw: &str, expr: &str) -> Result<TimeUnit, ValidationError> {
    TimeUnit::parse(raw).ok_or_else(|| ValidationError::TimeParse(expr.to_string()))
}

fn parse_amount(raw: &str, expr: &str) -> Result<i64, ValidationError> {
    raw.parse::<i64>()
        .map_err(|_| ValidationError::TimeParse(expr.to_string()))
}

fn offset(now: DateTime<Utc>, delta: HumanDelta, expr: &str) -> Result<DateTime<Utc>, ValidationError> {
    let anchor = if delta.unit.is_calendar() {
        start_of_day(now)
    } else {
        now
    };
    delta
        .add_to(anchor)
        .ok_or_else(|| ValidationError::TimeParse(expr.to_string()))
}

/// Resolve a single human datetime expression against `now`
pub fn parse_human_datetime(
    expr: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    let normalized = expr.trim().to_ascii_lowercase();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    let today = start_of_day(now);

    match normalized.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        "tomorrow" => return Ok(today + Duration::days(1)),
        _ => {}
    }

    if let Some(dt) = parse_iso_datetime(expr) {
        return Ok(dt);
    }

    if let Some(caps) = RE_OFFSET.captures(&normalized) {
        let amount = parse_amount(&caps[1], expr)?;
        let unit = parse_unit(&caps[2], expr)?;
        let delta = HumanDelta::new(amount, unit);
        let delta = if &caps[3] == "ago" { delta.negate() } else { delta };
        return offset(now, delta, expr);
    }

    if let Some(caps) = RE_LAST_NEXT.captures(&normalized) {
        let unit = parse_unit(&caps[2], expr)?;
        let amount = if &caps[1] == "last" { -1 } else { 1 };
        return offset(now, HumanDelta::new(amount, unit), expr);
    }

    Err(ValidationError::TimeParse(expr.to_string()))
}

/// Parse a duration such as `1 week`, `-2 days` or `3 months ago`
/// (`ago` negates)
pub fn parse_human_delta(expr: &str) -> Result<HumanDelta, ValidationError> {
    let normalized = expr.trim().to_ascii_lowercase();
    let caps = RE_DELTA
        .captures(&normalized)
        .ok_or_else(|| ValidationError::TimeParse(expr.to_string()))?;
    let amount = parse_amount(caps[1].trim_start_matches('+'), expr)?;
    let unit = parse_unit(&caps[2], expr)?;
    let delta = HumanDelta::new(amount, unit);
    Ok(if caps.get(3).is_some() { delta.negate() } else { delta })
}

/// Resolve a time range into `(since, until)`.
///
/// - no range or `No filter`: both bounds absent
/// - `Last day|week|month|quarter|year`: `relative_start` minus one unit up
///   to `relative_end`
/// - `Last N units` / `Next N units`
/// - `<since> : <until>` with either side optionally empty; a bare `N units`
///   since is read as `N units ago`
///
/// A time shift moves both bounds into the past by its magnitude.
pub fn get_since_until(
    time_range: Option<&str>,
    time_shift: Option<&str>,
    relative_start: &str,
    relative_end: &str,
    now: DateTime<Utc>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ValidationError> {
    let range = time_range.unwrap_or("");
    let trimmed = range.trim();
    let (since, until) = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_TIME_RANGE) {
        (None, None)
    } else if let Some((since, until)) = split_range(range) {
        let since = if since.is_empty() {
            None
        } else if RE_BARE_DELTA.is_match(&since.to_ascii_lowercase()) {
            Some(parse_human_datetime(&format!("{} ago", since), now)?)
        } else {
            Some(parse_human_datetime(since, now)?)
        };
        let until = if until.is_empty() {
            None
        } else {
            Some(parse_human_datetime(until, now)?)
        };
        (since, until)
    } else {
        let range = trimmed;
        let lower = range.to_ascii_lowercase();
        let start = parse_human_datetime(relative_start, now)?;
        let end = parse_human_datetime(relative_end, now)?;
        let (direction, delta) = if let Some(caps) = RE_LAST_NEXT.captures(&lower) {
            (caps[1].to_string(), HumanDelta::new(1, parse_unit(&caps[2], range)?))
        } else if let Some(caps) = RE_LAST_NEXT_N.captures(&lower) {
            let amount = parse_amount(&caps[2], range)?;
            (caps[1].to_string(), HumanDelta::new(amount, parse_unit(&caps[3], range)?))
        } else {
            return Err(ValidationError::TimeParse(range.to_string()));
        };
        let overflow = || ValidationError::TimeParse(range.to_string());
        if direction == "last" {
            (Some(delta.negate().add_to(start).ok_or_else(overflow)?), Some(end))
        } else {
            (Some(start), Some(delta.add_to(end).ok_or_else(overflow)?))
        }
    };

    let (since, until) = match time_shift.map(str::trim).filter(|s| !s.is_empty()) {
        None => (since, until),
        Some(shift) => {
            let delta = parse_human_delta(shift)?;
            let back = HumanDelta::new(-delta.amount.abs(), delta.unit);
            let overflow = || ValidationError::TimeParse(shift.to_string());
            (
                since.map(|dt| back.add_to(dt).ok_or_else(overflow)).transpose()?,
                until.map(|dt| back.add_to(dt).ok_or_else(overflow)).transpose()?,
            )
        }
    };

    if let (Some(since), Some(until)) = (since, until)
        && since > until
    {
        return Err(ValidationError::InvertedTimeRange);
    }
    Ok((since, until))
}

/// Split `<since> : <until>`; either side may be empty
fn split_range(range: &str) -> Option<(&str, &str)> {
    if let Some((since, until)) = range.split_once(TIME_RANGE_SEPARATOR) {
        return Some((since.trim(), until.trim()));
    }
    let trimmed = range.trim();
    if let Some(until) = trimmed.strip_prefix(':') {
        return Some(("", until.trim()));
    }
    trimmed.strip_suffix(':').map(|since| (since.trim(), ""))
}

#[cfg(test)]
#[path = "date_parser_tests.rs"]
mod tests;
