//! Identity keys for duplicate detection.
//!
//! Two events are considered the same when they share a title (ignoring case),
//! the same kind (all-day or timed) and the same start. The key for all-day
//! events uses the calendar day; the key for timed events uses the start
//! instant rendered in UTC so that offsets do not matter.

use std::collections::HashSet;

use crate::event::CalendarEvent;
use crate::time::EventSpan;

/// Derives the identity key of an event from its title and span.
///
/// ```
/// use calsweep_core::identity::identity_key;
/// use calsweep_core::EventSpan;
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2025, 9, 14).unwrap();
/// let key = identity_key(Some("Holiday"), &EventSpan::all_day(day, day.succ_opt().unwrap()));
/// assert_eq!(key, "Holiday|ALLDAY|2025-09-14");
/// ```
pub fn identity_key(summary: Option<&str>, span: &EventSpan) -> String {
    let summary = summary.unwrap_or("");
    match span {
        EventSpan::AllDay { start, .. } => {
            format!("{}|ALLDAY|{}", summary, start.format("%Y-%m-%d"))
        }
        EventSpan::Timed { start, .. } => format!("{}|TIMED|{}", summary, start.canonical()),
    }
}

/// Identity key of a whole event.
pub fn event_key(event: &CalendarEvent) -> String {
    identity_key(event.summary.as_deref(), &event.span)
}

/// A case-insensitive set of identity keys.
///
/// Built once from the destination window of a copy and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    keys: HashSet<String>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key. Returns false if an equal key (ignoring case) was present.
    pub fn insert(&mut self, key: &str) -> bool {
        self.keys.insert(key.to_lowercase())
    }

    /// Adds the key of an event.
    pub fn insert_event(&mut self, event: &CalendarEvent) -> bool {
        self.insert(&event_key(event))
    }

    /// Returns true if an equal key (ignoring case) is present.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<String> for DuplicateIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut index = Self::new();
        for key in iter {
            index.insert(&key);
        }
        index
    }
}
