//! Calendar stores for calsweep.
//!
//! - [`CalendarStore`] - the four calls the bulk operations make
//! - [`scan_window`] - lazy, page-by-page stream over a time window
//! - [`build_duplicate_index`] - identity keys of everything in a window
//! - [`ProviderError`] - classified store errors
//! - [`MemoryStore`] - in-process store
//! - [`google::GoogleStore`] - Google Calendar (feature `google`)
//!
//! # Example
//!
//! ```ignore
//! use calsweep_providers::{CalendarStore, scan_window};
//! use futures_util::TryStreamExt;
//!
//! let mut events = std::pin::pin!(scan_window(&store, "primary", window));
//! while let Some(event) = events.try_next().await? {
//!     println!("{}", event.title());
//! }
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod scan;
pub mod store;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult, StoreOperation};
pub use scan::{build_duplicate_index, scan_window};
pub use store::{BoxFuture, CalendarStore, EventPage, EventPatch, MemoryStore, StoreCall};
