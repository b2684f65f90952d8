//! Moving events in time.
//!
//! [`shift_event`] turns an existing event into a candidate for insertion
//! `delta` later (or earlier). All-day events move by whole calendar days,
//! timed events move by the exact delta.

use chrono::{NaiveDate, TimeDelta};
use thiserror::Error;

use crate::event::CalendarEvent;
use crate::time::{EventInstant, EventSpan};

const SECONDS_PER_DAY: i64 = 86_400;

/// Errors raised while shifting an event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShiftError {
    /// The shifted date or instant falls outside the representable range.
    #[error("shifting {label} by {delta} leaves the representable date range")]
    OutOfRange { label: String, delta: TimeDelta },
}

/// Number of whole days in `delta`, floored, and whether flooring dropped a remainder.
///
/// `-36h` is `(-2, true)`: the date arithmetic lands on the earlier day.
pub fn whole_days(delta: TimeDelta) -> (i64, bool) {
    // num_seconds truncates toward zero; step down for negative fractions
    let fraction = delta.subsec_nanos();
    let secs = if fraction < 0 {
        delta.num_seconds() - 1
    } else {
        delta.num_seconds()
    };
    let exact = fraction == 0 && secs.rem_euclid(SECONDS_PER_DAY) == 0;
    (secs.div_euclid(SECONDS_PER_DAY), !exact)
}

/// Produces a copy of `event` moved by `delta`, ready to be inserted.
///
/// - The result has no id and no recurrence link.
/// - All-day spans move by `whole_days(delta)`; the exclusive end keeps its distance.
/// - Timed spans move by `delta`. The start keeps its own zone; the end keeps
///   its zone or, when it has none, takes `default_zone`.
/// - Every other attribute is copied verbatim.
pub fn shift_event(
    event: &CalendarEvent,
    delta: TimeDelta,
    default_zone: Option<&str>,
) -> Result<CalendarEvent, ShiftError> {
    let out_of_range = || ShiftError::OutOfRange {
        label: event.span.start_label(),
        delta,
    };

    let span = match &event.span {
        EventSpan::AllDay { start, end } => {
            let (days, _) = whole_days(delta);
            let days = TimeDelta::try_days(days).ok_or_else(out_of_range)?;
            EventSpan::AllDay {
                start: add_days(*start, days).ok_or_else(out_of_range)?,
                end: add_days(*end, days).ok_or_else(out_of_range)?,
            }
        }
        EventSpan::Timed { start, end } => {
            let new_start = EventInstant {
                at: start.at.checked_add_signed(delta).ok_or_else(out_of_range)?,
                time_zone: start.time_zone.clone(),
            };
            let new_end = EventInstant {
                at: end.at.checked_add_signed(delta).ok_or_else(out_of_range)?,
                time_zone: end
                    .time_zone
                    .clone()
                    .or_else(|| default_zone.map(str::to_string)),
            };
            EventSpan::Timed {
                start: new_start,
                end: new_end,
            }
        }
    };

    Ok(CalendarEvent {
        id: None,
        summary: event.summary.clone(),
        span,
        color_id: event.color_id.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        visibility: event.visibility.clone(),
        reminders: event.reminders.clone(),
        source: event.source.clone(),
        recurring_event_id: None,
    })
}

fn add_days(date: NaiveDate, days: TimeDelta) -> Option<NaiveDate> {
    date.checked_add_signed(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventReminders, EventSource, ReminderOverride};
    use chrono::DateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instant(s: &str) -> EventInstant {
        EventInstant::new(DateTime::parse_from_rfc3339(s).unwrap())
    }

    fn standup() -> CalendarEvent {
        CalendarEvent::new(EventSpan::timed(
            instant("2025-09-01T09:00:00+01:00").with_time_zone("Europe/London"),
            instant("2025-09-01T09:15:00+01:00").with_time_zone("Europe/London"),
        ))
        .with_id("src-1")
        .with_summary("Standup")
    }

    #[test]
    fn whole_days_floors() {
        assert_eq!(whole_days(TimeDelta::days(7)), (7, false));
        assert_eq!(whole_days(TimeDelta::days(-7)), (-7, false));
        assert_eq!(whole_days(TimeDelta::hours(36)), (1, true));
        assert_eq!(whole_days(TimeDelta::hours(-36)), (-2, true));
        assert_eq!(whole_days(TimeDelta::zero()), (0, false));
        assert_eq!(whole_days(TimeDelta::milliseconds(1)), (0, true));
    }

    #[test]
    fn timed_event_moves_by_exact_delta() {
        let shifted = shift_event(&standup(), TimeDelta::days(7), None).unwrap();
        let EventSpan::Timed { start, end } = &shifted.span else {
            panic!("expected timed span");
        };
        assert_eq!(start.at, DateTime::parse_from_rfc3339("2025-09-08T09:00:00+01:00").unwrap());
        assert_eq!(end.at, DateTime::parse_from_rfc3339("2025-09-08T09:15:00+01:00").unwrap());
        assert_eq!(start.time_zone.as_deref(), Some("Europe/London"));
        assert_eq!(end.time_zone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn timed_shift_is_invertible() {
        let original = standup();
        let delta = TimeDelta::hours(30) + TimeDelta::minutes(7) + TimeDelta::seconds(3);
        let there = shift_event(&original, delta, None).unwrap();
        let back = shift_event(&there, -delta, None).unwrap();
        assert_eq!(back.span, original.span);
    }

    #[test]
    fn only_a_missing_end_zone_is_backfilled() {
        let event = CalendarEvent::new(EventSpan::timed(
            instant("2025-09-01T09:00:00Z"),
            instant("2025-09-01T10:00:00Z"),
        ));
        let shifted = shift_event(&event, TimeDelta::days(1), Some("Europe/Berlin")).unwrap();
        let EventSpan::Timed { start, end } = &shifted.span else {
            panic!("expected timed span");
        };
        assert_eq!(start.time_zone, None);
        assert_eq!(end.time_zone.as_deref(), Some("Europe/Berlin"));

        let with_zone = standup();
        let shifted = shift_event(&with_zone, TimeDelta::days(1), Some("Europe/Berlin")).unwrap();
        let EventSpan::Timed { end, .. } = &shifted.span else {
            panic!("expected timed span");
        };
        assert_eq!(end.time_zone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn all_day_event_keeps_exclusive_end_distance() {
        let event = CalendarEvent::new(EventSpan::all_day(date(2025, 9, 14), date(2025, 9, 17)));
        let shifted = shift_event(&event, TimeDelta::days(14), None).unwrap();
        assert_eq!(shifted.span, EventSpan::all_day(date(2025, 9, 28), date(2025, 10, 1)));
    }

    #[test]
    fn all_day_event_floors_partial_days() {
        let event = CalendarEvent::new(EventSpan::all_day(date(2025, 9, 14), date(2025, 9, 15)));

        let forward = shift_event(&event, TimeDelta::hours(36), None).unwrap();
        assert_eq!(forward.span, EventSpan::all_day(date(2025, 9, 15), date(2025, 9, 16)));

        let backward = shift_event(&event, TimeDelta::hours(-36), None).unwrap();
        assert_eq!(backward.span, EventSpan::all_day(date(2025, 9, 12), date(2025, 9, 13)));
    }

    #[test]
    fn attributes_are_copied_and_identity_dropped() {
        let mut event = standup()
            .with_color("3")
            .with_description("daily")
            .with_location("Room 4");
        event.visibility = Some("private".to_string());
        event.recurring_event_id = Some("series-9".to_string());
        event.reminders = Some(EventReminders {
            use_default: false,
            overrides: vec![ReminderOverride {
                method: "popup".to_string(),
                minutes: 5,
            }],
        });
        event.source = Some(EventSource {
            title: Some("wiki".to_string()),
            url: Some("https://example.com".to_string()),
        });

        let shifted = shift_event(&event, TimeDelta::days(7), None).unwrap();
        assert_eq!(shifted.id, None);
        assert_eq!(shifted.recurring_event_id, None);
        assert_eq!(shifted.summary, event.summary);
        assert_eq!(shifted.color_id, event.color_id);
        assert_eq!(shifted.description, event.description);
        assert_eq!(shifted.location, event.location);
        assert_eq!(shifted.visibility, event.visibility);
        assert_eq!(shifted.reminders, event.reminders);
        assert_eq!(shifted.source, event.source);
    }

    #[test]
    fn overflow_is_reported() {
        let event = CalendarEvent::new(EventSpan::all_day(NaiveDate::MAX, NaiveDate::MAX));
        let err = shift_event(&event, TimeDelta::days(1), None).unwrap_err();
        assert!(matches!(err, ShiftError::OutOfRange { .. }));
    }
}
