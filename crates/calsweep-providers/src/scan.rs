//! Lazy window scanning.
//!
//! [`scan_window`] turns the page-at-a-time [`CalendarStore::list_events`]
//! into a stream of events. The next page is only requested once the caller
//! has consumed the current one, so an operation that fails halfway never
//! lists more than it needed.

use calsweep_core::{CalendarEvent, DuplicateIndex, TimeWindow};
use futures_util::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::store::CalendarStore;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Streams every event of `window`, page by page, in store order.
///
/// The stream ends after the first page whose continuation token is absent
/// or empty. The first listing error is yielded and ends the stream.
pub fn scan_window<'a, S>(
    store: &'a S,
    calendar_id: &'a str,
    window: TimeWindow,
) -> impl Stream<Item = ProviderResult<CalendarEvent>> + Send + 'a
where
    S: CalendarStore + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let token = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = store
            .list_events(calendar_id, window, token.as_deref())
            .await?;
        debug!(
            store = store.name(),
            calendar = calendar_id,
            events = page.events.len(),
            more = page.next_page_token.as_deref().is_some_and(|t| !t.is_empty()),
            "fetched page"
        );

        let next = match page.next_page_token {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        };
        let events = stream::iter(page.events.into_iter().map(Ok::<_, ProviderError>));
        Ok(Some((events, next)))
    })
    .try_flatten()
}

/// Collects the identity keys of every event in `window`.
pub async fn build_duplicate_index<S>(
    store: &S,
    calendar_id: &str,
    window: TimeWindow,
) -> ProviderResult<DuplicateIndex>
where
    S: CalendarStore + ?Sized,
{
    let index = scan_window(store, calendar_id, window)
        .try_fold(DuplicateIndex::new(), |mut index, event| async move {
            index.insert_event(&event);
            Ok(index)
        })
        .await?;
    debug!(calendar = calendar_id, keys = index.len(), "built duplicate index");
    Ok(index)
}
