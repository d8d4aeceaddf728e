#![forbid(unsafe_code)]

//! Read-side record materialization for B-tree leaf pages.

/// Cell encoding and value-cell resolution.
pub mod cell;
/// Page image format and parsing.
pub mod page;

mod context;
mod key;
mod layout;
mod resolve;
mod sink;
mod stats;
mod update;

pub use context::TreeContext;
pub use key::{instantiate_key, key_needs_processing};
pub use page::{Page, PageBuilder, PageLayout};
pub use resolve::{Position, Session};
pub use sink::{KeyRef, Record, ValueRef};
pub use stats::{ResolveStats, ResolveStatsSnapshot};
pub use update::{resolve_overlay, Overlay, Update, UpdatePayload};
