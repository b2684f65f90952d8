//! Calendar event model.
//!
//! [`CalendarEvent`] is the provider-agnostic shape the bulk operations read
//! from and write to a calendar store. Attributes this tool does not interpret
//! (description, location, reminders, visibility, source) are carried so that
//! copies are faithful.

use serde::{Deserialize, Serialize};

use crate::time::EventSpan;

/// A reminder override (e.g. popup 10 minutes before).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderOverride {
    /// Delivery method, e.g. `"popup"` or `"email"`.
    pub method: String,
    /// Minutes before the start.
    pub minutes: i64,
}

/// Reminder settings of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReminders {
    /// Whether the calendar's default reminders apply.
    pub use_default: bool,
    /// Explicit reminders, used when `use_default` is false.
    #[serde(default)]
    pub overrides: Vec<ReminderOverride>,
}

/// Where an event was created from (a web page, an email).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// A calendar event as exchanged with a calendar store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Store-assigned identifier. `None` for events that were not created yet.
    pub id: Option<String>,

    /// The event title.
    pub summary: Option<String>,

    /// When the event happens.
    pub span: EventSpan,

    /// Display color token.
    pub color_id: Option<String>,

    pub description: Option<String>,
    pub location: Option<String>,
    pub visibility: Option<String>,
    pub reminders: Option<EventReminders>,
    pub source: Option<EventSource>,

    /// Parent series of an expanded recurring instance. Read-only.
    #[serde(default)]
    pub recurring_event_id: Option<String>,
}

impl CalendarEvent {
    /// Creates an event with only a span; everything else empty.
    pub fn new(span: EventSpan) -> Self {
        Self {
            id: None,
            summary: None,
            span,
            color_id: None,
            description: None,
            location: None,
            visibility: None,
            reminders: None,
            source: None,
            recurring_event_id: None,
        }
    }

    /// Returns the summary, treating an absent one as empty.
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }

    /// Returns true if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.span.is_all_day()
    }

    /// Builder method to set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the color.
    pub fn with_color(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
