//! Read-side record resolution for B-tree leaf and column pages.
//!
//! Given a located position (a pinned page, a slot, and the head of that slot's
//! update chain) the resolver produces the logical key/value pair, either copied
//! into session-owned scratch buffers or handed to a zero-copy consumer.

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use storage::btree::{
    Page, PageBuilder, PageLayout, Position, Record, ResolveStats, ResolveStatsSnapshot,
    Session, TreeContext, Update,
};
pub use storage::{CodecKind, ResolverOptions};
pub use types::{Error, Result};
