//! Bulk operations over a window of events.
//!
//! [`BulkOperationRunner`] drives one of three operations against a
//! [`CalendarStore`]:
//!
//! - [`recolor`](BulkOperationRunner::recolor) applies the color of the first matching rule
//! - [`delete`](BulkOperationRunner::delete) removes events matched by any rule
//! - [`copy`](BulkOperationRunner::copy) duplicates a window at another start, skipping
//!   events that already exist at the destination
//!
//! Events are processed one at a time, in listing order. The first store
//! failure ends the run; the counters gathered up to that point travel with
//! the error in [`RunError`].

use std::fmt;

use calsweep_core::{
    CalendarEvent, RuleSet, ShiftError, TimeWindow, event_key, shift_event, whole_days,
};
use calsweep_providers::{
    CalendarStore, EventPatch, ProviderError, build_duplicate_index, scan_window,
};
use chrono::{DateTime, TimeDelta, Utc};
use futures_util::TryStreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Counters of a recolor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecolorSummary {
    pub updated: usize,
    pub already_correct: usize,
    pub unmatched: usize,
}

impl fmt::Display for RecolorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "updated {}, already correct {}, no rule {}",
            self.updated, self.already_correct, self.unmatched
        )
    }
}

/// Counters of a delete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub kept: usize,
}

impl fmt::Display for DeleteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deleted {}, kept {}", self.deleted, self.kept)
    }
}

/// Counters of a copy run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub created: usize,
    pub skipped: usize,
}

impl fmt::Display for CopySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "created {}, skipped {}", self.created, self.skipped)
    }
}

/// What stopped a run.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error(transparent)]
    Store(#[from] ProviderError),

    #[error(transparent)]
    Shift(#[from] ShiftError),
}

/// A run that stopped early, with the counters it had reached.
#[derive(Debug)]
pub struct RunError<S> {
    pub partial: S,
    pub cause: RunFailure,
}

impl<S: fmt::Display> fmt::Display for RunError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (stopped after: {})", self.cause, self.partial)
    }
}

impl<S: fmt::Debug + fmt::Display> std::error::Error for RunError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

fn finish<S>(summary: S, outcome: Result<(), RunFailure>) -> Result<S, RunError<S>> {
    match outcome {
        Ok(()) => Ok(summary),
        Err(cause) => Err(RunError {
            partial: summary,
            cause,
        }),
    }
}

/// Runs bulk operations against one calendar of a store.
pub struct BulkOperationRunner<'a> {
    store: &'a dyn CalendarStore,
    calendar_id: &'a str,
}

impl<'a> BulkOperationRunner<'a> {
    pub fn new(store: &'a dyn CalendarStore, calendar_id: &'a str) -> Self {
        Self { store, calendar_id }
    }

    /// Gives every event in `window` the color of the first rule matching its title.
    ///
    /// Events whose color is already right are left alone, so running twice
    /// updates nothing the second time.
    pub async fn recolor(
        &self,
        window: TimeWindow,
        rules: &RuleSet,
    ) -> Result<RecolorSummary, RunError<RecolorSummary>> {
        info!(
            store = self.store.name(),
            calendar = self.calendar_id,
            start = %window.start,
            end = %window.end,
            rules = rules.len(),
            "recoloring"
        );
        let mut summary = RecolorSummary::default();
        let outcome = self.recolor_into(window, rules, &mut summary).await;
        finish(summary, outcome)
    }

    async fn recolor_into(
        &self,
        window: TimeWindow,
        rules: &RuleSet,
        summary: &mut RecolorSummary,
    ) -> Result<(), RunFailure> {
        let mut events = std::pin::pin!(scan_window(self.store, self.calendar_id, window));

        while let Some(event) = events.try_next().await? {
            let start = event.span.start_label();
            let color = rules
                .first_match(event.summary.as_deref())
                .and_then(|rule| rule.color_id.as_deref());

            let Some(color) = color else {
                summary.unmatched += 1;
                info!(outcome = "no-rule", %start, title = event.title());
                continue;
            };

            if event.color_id.as_deref() == Some(color) {
                summary.already_correct += 1;
                info!(outcome = "already", %start, title = event.title(), color_id = color);
                continue;
            }

            let Some(id) = event.id.as_deref() else {
                warn!(%start, title = event.title(), "listed event has no id, cannot update");
                continue;
            };

            self.store
                .update_event(self.calendar_id, id, &EventPatch::color(color))
                .await?;
            summary.updated += 1;
            info!(
                outcome = "updated",
                %start,
                title = event.title(),
                from = event.color_id.as_deref().unwrap_or("default"),
                color_id = color
            );
        }
        Ok(())
    }

    /// Deletes every event in `window` whose title matches any rule.
    pub async fn delete(
        &self,
        window: TimeWindow,
        rules: &RuleSet,
    ) -> Result<DeleteSummary, RunError<DeleteSummary>> {
        info!(
            store = self.store.name(),
            calendar = self.calendar_id,
            start = %window.start,
            end = %window.end,
            rules = rules.len(),
            "deleting"
        );
        let mut summary = DeleteSummary::default();
        let outcome = self.delete_into(window, rules, &mut summary).await;
        finish(summary, outcome)
    }

    async fn delete_into(
        &self,
        window: TimeWindow,
        rules: &RuleSet,
        summary: &mut DeleteSummary,
    ) -> Result<(), RunFailure> {
        let mut events = std::pin::pin!(scan_window(self.store, self.calendar_id, window));

        while let Some(event) = events.try_next().await? {
            let start = event.span.start_label();
            if !rules.any_match(event.summary.as_deref()) {
                summary.kept += 1;
                debug!(outcome = "kept", %start, title = event.title());
                continue;
            }

            let Some(id) = event.id.as_deref() else {
                warn!(%start, title = event.title(), "listed event has no id, cannot delete");
                continue;
            };

            self.store.delete_event(self.calendar_id, id).await?;
            summary.deleted += 1;
            info!(outcome = "deleted", %start, title = event.title());
        }
        Ok(())
    }

    /// Copies every event of `source` so that the copy of the window starts at `target_start`.
    ///
    /// The destination window has the width of `source`. Its events are
    /// indexed once, before anything is inserted; a shifted event whose
    /// identity key is in that index is skipped. Events inserted by this run
    /// are not added to the index.
    ///
    /// A zero offset returns empty counters without calling the store.
    pub async fn copy(
        &self,
        source: TimeWindow,
        target_start: DateTime<Utc>,
        default_zone: Option<&str>,
    ) -> Result<CopySummary, RunError<CopySummary>> {
        let delta = target_start - source.start;
        if delta == TimeDelta::zero() {
            warn!(start = %source.start, "target start equals source start, nothing to shift");
            return Ok(CopySummary::default());
        }

        let target = source.shifted_to(target_start);
        info!(
            store = self.store.name(),
            calendar = self.calendar_id,
            source_start = %source.start,
            source_end = %source.end,
            target_start = %target.start,
            time_zone = default_zone.unwrap_or("calendar default"),
            "copying"
        );

        let mut summary = CopySummary::default();
        let outcome = self
            .copy_into(source, target, delta, default_zone, &mut summary)
            .await;
        finish(summary, outcome)
    }

    async fn copy_into(
        &self,
        source: TimeWindow,
        target: TimeWindow,
        delta: TimeDelta,
        default_zone: Option<&str>,
        summary: &mut CopySummary,
    ) -> Result<(), RunFailure> {
        let existing = build_duplicate_index(self.store, self.calendar_id, target).await?;
        let mut warned_inexact = false;

        let mut events = std::pin::pin!(scan_window(self.store, self.calendar_id, source));
        while let Some(event) = events.try_next().await? {
            if event.is_all_day() && !warned_inexact {
                let (days, inexact) = whole_days(delta);
                if inexact {
                    warn!(%delta, days, "offset is not a whole number of days, all-day events move by the floored day count");
                }
                warned_inexact = true;
            }

            let candidate = shift_event(&event, delta, default_zone)?;
            let start = candidate.span.start_label();

            if existing.contains(&event_key(&candidate)) {
                summary.skipped += 1;
                info!(outcome = "exists", %start, title = candidate.title());
                continue;
            }

            let created = self.insert(&candidate).await?;
            summary.created += 1;
            info!(
                outcome = "created",
                %start,
                title = candidate.title(),
                id = created.id.as_deref().unwrap_or(""),
                series = event.recurring_event_id.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    async fn insert(&self, event: &CalendarEvent) -> Result<CalendarEvent, ProviderError> {
        self.store.insert_event(self.calendar_id, event).await
    }
}
