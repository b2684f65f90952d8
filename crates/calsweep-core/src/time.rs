//! Time types for calendar events.
//!
//! This module provides [`EventSpan`] for representing when an event happens
//! (either whole calendar days or a pair of absolute instants),
//! [`EventInstant`] for one timed boundary, and [`TimeWindow`] for defining
//! query ranges.

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building windows or parsing window bounds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    /// The text is neither an RFC 3339 timestamp, a local date-time nor a date.
    #[error("invalid date or date-time: {0:?}")]
    Unparsable(String),

    /// A local time does not exist in the zone (DST gap).
    #[error("local time {0} does not exist in the configured time zone")]
    NonexistentLocalTime(NaiveDateTime),

    /// Window end lies before its start.
    #[error("window end {end} is before start {start}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// One boundary of a timed event.
///
/// The offset reported by the store is preserved so that a copied event is
/// written back in the same local representation it was read with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInstant {
    /// The absolute instant, with the offset it was reported in.
    pub at: DateTime<FixedOffset>,
    /// IANA zone name attached to this boundary, if any.
    pub time_zone: Option<String>,
}

impl EventInstant {
    /// Creates an instant without a named zone.
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self {
            at,
            time_zone: None,
        }
    }

    /// Builder method to attach a named zone.
    pub fn with_time_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = Some(zone.into());
        self
    }

    /// Returns the instant in UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.at.with_timezone(&Utc)
    }

    /// Canonical, round-trippable rendering: UTC, nanosecond precision.
    pub fn canonical(&self) -> String {
        self.to_utc().to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

/// When an event happens.
///
/// An event is either wholly all-day or wholly timed; mixing a date-only
/// start with a timed end is not representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventSpan {
    /// Calendar days. `end` is exclusive: a one-day event has `end = start + 1`.
    AllDay { start: NaiveDate, end: NaiveDate },
    /// Absolute instants.
    Timed {
        start: EventInstant,
        end: EventInstant,
    },
}

impl EventSpan {
    /// Creates an all-day span.
    pub fn all_day(start: NaiveDate, end: NaiveDate) -> Self {
        Self::AllDay { start, end }
    }

    /// Creates a timed span.
    pub fn timed(start: EventInstant, end: EventInstant) -> Self {
        Self::Timed { start, end }
    }

    /// Returns `true` for all-day spans.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay { .. })
    }

    /// Short human-readable label of the start, used in log lines.
    pub fn start_label(&self) -> String {
        match self {
            Self::AllDay { start, .. } => start.format("%Y-%m-%d").to_string(),
            Self::Timed { start, .. } => start.at.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::InvertedWindow`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if start > end {
            return Err(TimeError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns the width of this time window.
    pub fn width(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Returns a window of the same width beginning at `start`.
    pub fn shifted_to(&self, start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + self.width(),
        }
    }

    /// Checks if a datetime falls within this window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }
}

/// Parses a window bound given on the command line.
///
/// Accepts, in order:
/// - an RFC 3339 timestamp with offset (`2025-09-01T09:00:00+02:00`)
/// - a local date-time without offset (`2025-09-01T09:00[:00]`), read in `tz`
/// - a bare date (`2025-09-01`), meaning local midnight in `tz`
///
/// Ambiguous local times (DST fold) resolve to the earlier instant.
pub fn parse_bound<Tz: TimeZone>(text: &str, tz: &Tz) -> Result<DateTime<Utc>, TimeError> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| TimeError::Unparsable(text.to_string()))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(TimeError::NonexistentLocalTime(naive)),
    }
}
