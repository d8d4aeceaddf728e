//! Record resolution over pinned B-tree pages and the collaborators it reads from.
//!
//! The B-tree module turns (page, slot, update chain) into key/value bytes; the
//! overflow and compression modules supply out-of-page payloads and decoders.

/// Page formats, cell codec, and the record resolver.
pub mod btree;

/// Decompression services configured per tree.
pub mod compress;

/// Out-of-page payload stores and the overflow resolver.
pub mod overflow;

mod options;

pub use compress::{Decoder, SnappyDecoder};
pub use options::{CodecKind, ResolverOptions};
pub use overflow::{FileOverflowStore, MemOverflowStore, OverflowStore};
