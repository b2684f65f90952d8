//! Core types: events, time windows, title rules, shifting, identity keys
//!
//! Nothing in this crate performs I/O; the calendar store and the bulk
//! operations built on top of it live in `calsweep-providers` and
//! `calsweep-client`.

pub mod event;
pub mod identity;
pub mod rules;
pub mod shift;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, EventReminders, EventSource, ReminderOverride};
pub use identity::{DuplicateIndex, event_key, identity_key};
pub use rules::{Rule, RuleConfig, RuleError, RulePolicy, RuleSet, TitleMatcher, matches};
pub use shift::{ShiftError, shift_event, whole_days};
pub use time::{EventInstant, EventSpan, TimeError, TimeWindow, parse_bound};
pub use self::tracing::{LineDetail, TracingConfig, TracingError, TracingOutputFormat, init_tracing};
