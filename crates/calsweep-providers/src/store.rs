//! CalendarStore trait definition.
//!
//! [`CalendarStore`] is the seam between the bulk operations and a calendar
//! backend. It exposes exactly the four calls the operations need: listing a
//! window one page at a time, patching the color of an event, deleting an
//! event and inserting a new one.
//!
//! [`MemoryStore`] is a complete in-process implementation, used for dry runs
//! against fixtures and in tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use calsweep_core::{CalendarEvent, EventSpan, TimeWindow};
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::error::{ProviderError, ProviderResult, StoreOperation};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the runner can hold a
/// `&dyn CalendarStore`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One page of a window listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events on this page, in store order.
    pub events: Vec<CalendarEvent>,
    /// Continuation token. Absent or empty means this was the last page.
    pub next_page_token: Option<String>,
}

impl EventPage {
    /// Creates a final page.
    pub fn last(events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            next_page_token: None,
        }
    }

    /// Builder method to set the continuation token.
    pub fn with_next_page_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }
}

/// Partial update applied by [`CalendarStore::update_event`].
///
/// Only the fields that are `Some` are sent; everything else on the stored
/// event is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub color_id: Option<String>,
}

impl EventPatch {
    /// A patch that only changes the color.
    pub fn color(color_id: impl Into<String>) -> Self {
        Self {
            color_id: Some(color_id.into()),
        }
    }
}

/// A calendar backend the bulk operations can read from and write to.
///
/// # Implementation Notes
///
/// - `list_events` returns every event overlapping the window, with
///   recurring series expanded into single instances.
/// - Page tokens are opaque and must stay valid while the caller mutates
///   the calendar between pages.
/// - No retries happen at this layer; an error ends the current operation.
pub trait CalendarStore: Send + Sync {
    /// Returns the name/type of this store (e.g., "google", "memory").
    fn name(&self) -> &str;

    /// Fetches one page of events overlapping `window`.
    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeWindow,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>>;

    /// Applies `patch` to an existing event.
    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        patch: &'a EventPatch,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Deletes an existing event.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Creates a new event and returns it as stored (with its new id).
    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>>;
}

/// A call received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List { page_token: Option<String> },
    Update { event_id: String, color_id: Option<String> },
    Delete { event_id: String },
    Insert { summary: Option<String>, start: String },
}

impl StoreCall {
    fn operation(&self) -> StoreOperation {
        match self {
            Self::List { .. } => StoreOperation::List,
            Self::Update { .. } => StoreOperation::Update,
            Self::Delete { .. } => StoreOperation::Delete,
            Self::Insert { .. } => StoreOperation::Insert,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    calendars: HashMap<String, Vec<CalendarEvent>>,
    // listing snapshots, addressed by the cursor part of a page token
    snapshots: Vec<Vec<CalendarEvent>>,
    calls: Vec<StoreCall>,
    next_id: u64,
    failure: Option<(StoreOperation, usize)>,
}

impl MemoryState {
    fn record(&mut self, call: StoreCall) -> ProviderResult<()> {
        let operation = call.operation();
        self.calls.push(call);
        if let Some((op, remaining)) = self.failure.as_mut() {
            if *op == operation {
                if *remaining == 0 {
                    return Err(ProviderError::server(format!(
                        "injected {} failure",
                        operation.as_str()
                    ))
                    .during(operation));
                }
                *remaining -= 1;
            }
        }
        Ok(())
    }

    fn calendar_mut(&mut self, calendar_id: &str) -> &mut Vec<CalendarEvent> {
        self.calendars.entry(calendar_id.to_string()).or_default()
    }
}

/// An in-memory calendar store.
///
/// Listings are paginated with `page_size` events per page. The first page
/// request snapshots the matching events, so later pages are unaffected by
/// updates, deletes or inserts made in between.
#[derive(Debug)]
pub struct MemoryStore {
    page_size: usize,
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(250)
    }
}

impl MemoryStore {
    /// Creates an empty store with the given page size (at least 1).
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Builder method to seed events into a calendar.
    ///
    /// Events without an id are given one.
    pub fn with_events(mut self, calendar_id: &str, events: Vec<CalendarEvent>) -> Self {
        {
            let state = self.state.get_mut();
            for mut event in events {
                if event.id.is_none() {
                    state.next_id += 1;
                    event.id = Some(format!("mem-{}", state.next_id));
                }
                state.calendar_mut(calendar_id).push(event);
            }
        }
        self
    }

    /// Makes the call of `operation` after `successes` successful ones fail.
    pub fn fail_after(mut self, operation: StoreOperation, successes: usize) -> Self {
        self.state.get_mut().failure = Some((operation, successes));
        self
    }

    /// Returns every call received so far, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// Returns the events of a calendar, in insertion order.
    pub async fn events(&self, calendar_id: &str) -> Vec<CalendarEvent> {
        self.state
            .lock()
            .await
            .calendars
            .get(calendar_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns true if any call other than a listing was received.
    pub async fn was_mutated(&self) -> bool {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .any(|call| !matches!(call, StoreCall::List { .. }))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Bounds of a span in UTC. All-day spans are read as UTC midnights.
fn span_bounds(span: &EventSpan) -> (DateTime<Utc>, DateTime<Utc>) {
    match span {
        EventSpan::AllDay { start, end } => (midnight(*start), midnight(*end)),
        EventSpan::Timed { start, end } => (start.to_utc(), end.to_utc()),
    }
}

fn overlaps(span: &EventSpan, window: &TimeWindow) -> bool {
    let (start, end) = span_bounds(span);
    // zero-length events still match when they start inside the window
    (end > window.start || (start == end && start >= window.start)) && start < window.end
}

fn parse_page_token(token: &str) -> ProviderResult<(usize, usize)> {
    let invalid = || ProviderError::bad_request(format!("invalid page token {token:?}"));
    let (cursor, offset) = token.split_once(':').ok_or_else(invalid)?;
    Ok((
        cursor.parse().map_err(|_| invalid())?,
        offset.parse().map_err(|_| invalid())?,
    ))
}

impl CalendarStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeWindow,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.record(StoreCall::List {
                page_token: page_token.map(str::to_string),
            })?;

            let (cursor, offset) = match page_token {
                Some(token) => parse_page_token(token).map_err(|e| e.during(StoreOperation::List))?,
                None => {
                    let mut matching: Vec<CalendarEvent> = state
                        .calendars
                        .get(calendar_id)
                        .map(|events| {
                            events
                                .iter()
                                .filter(|event| overlaps(&event.span, &window))
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    matching.sort_by_key(|event| span_bounds(&event.span).0);
                    state.snapshots.push(matching);
                    (state.snapshots.len() - 1, 0)
                }
            };

            let snapshot = state.snapshots.get(cursor).ok_or_else(|| {
                ProviderError::bad_request(format!("unknown listing cursor {cursor}"))
                    .during(StoreOperation::List)
            })?;

            let end = (offset + self.page_size).min(snapshot.len());
            let events = snapshot.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
            let page = EventPage::last(events);

            Ok(if end < snapshot.len() {
                page.with_next_page_token(format!("{cursor}:{end}"))
            } else {
                page
            })
        })
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        patch: &'a EventPatch,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.record(StoreCall::Update {
                event_id: event_id.to_string(),
                color_id: patch.color_id.clone(),
            })?;

            let event = state
                .calendar_mut(calendar_id)
                .iter_mut()
                .find(|event| event.id.as_deref() == Some(event_id))
                .ok_or_else(|| {
                    ProviderError::not_found(format!("event {event_id} not found"))
                        .during(StoreOperation::Update)
                })?;

            if let Some(color_id) = &patch.color_id {
                event.color_id = Some(color_id.clone());
            }
            Ok(())
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.record(StoreCall::Delete {
                event_id: event_id.to_string(),
            })?;

            let events = state.calendar_mut(calendar_id);
            let before = events.len();
            events.retain(|event| event.id.as_deref() != Some(event_id));
            if events.len() == before {
                return Err(ProviderError::not_found(format!("event {event_id} not found"))
                    .during(StoreOperation::Delete));
            }
            Ok(())
        })
    }

    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.record(StoreCall::Insert {
                summary: event.summary.clone(),
                start: event.span.start_label(),
            })?;

            state.next_id += 1;
            let mut stored = event.clone();
            stored.id = Some(format!("mem-{}", state.next_id));
            state.calendar_mut(calendar_id).push(stored.clone());
            Ok(stored)
        })
    }
}
