//! Record resolution: overlay check, key materialization, per-layout value lookup,
//! then delivery through a [`ResultSink`].

use std::sync::Arc;

use tracing::{trace, warn};

use crate::types::{ConsumerError, Error, Result};

use super::context::TreeContext;
use super::key::materialize_key;
use super::layout::resolve_on_page;
use super::page::{Page, PageLayout};
use super::sink::{ConsumerSink, CopySink, Record, ResultSink, Scratch, ValueRef};
use super::update::{resolve_overlay, Overlay, Update};

/// A located record: pinned page, slot index and the update-chain head seen by search.
#[derive(Clone, Debug)]
pub struct Position {
    page: Arc<Page>,
    slot: usize,
    update: Option<Arc<Update>>,
}

impl Position {
    /// A position with no pending update.
    pub fn new(page: Arc<Page>, slot: usize) -> Self {
        Self {
            page,
            slot,
            update: None,
        }
    }

    /// Attaches the head of the slot's update chain.
    pub fn with_update(mut self, head: Arc<Update>) -> Self {
        self.update = Some(head);
        self
    }

    /// The pinned page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Slot index on the page.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Head of the update chain, if any.
    pub fn update(&self) -> Option<&Update> {
        self.update.as_deref()
    }
}

/// Per-caller resolve state.
///
/// Owns the scratch buffers that back copied-out records; a session is used by one
/// thread at a time while pages and tree contexts are shared.
#[derive(Debug, Default)]
pub struct Session {
    scratch: Scratch,
}

impl Session {
    /// Creates a session with no buffers allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the record at `pos` and copies it into session-owned buffers.
    ///
    /// The returned record stays valid after the page is released, until the next call
    /// on this session.
    pub fn resolve_record(
        &mut self,
        ctx: &TreeContext,
        pos: &Position,
        want_key: bool,
    ) -> Result<Record<'_>> {
        resolve_with_sink(&mut self.scratch, ctx, pos, want_key, CopySink)
    }

    /// Resolves the record at `pos` and hands borrowed views to `consumer`.
    ///
    /// Views are only valid during the call. Values that need decoding, decompression or
    /// an overflow fetch are still materialized in session scratch first.
    pub fn resolve_record_with<F>(
        &mut self,
        ctx: &TreeContext,
        pos: &Position,
        want_key: bool,
        consumer: F,
    ) -> Result<()>
    where
        F: FnOnce(Option<&[u8]>, &[u8]) -> std::result::Result<(), ConsumerError>,
    {
        resolve_with_sink(&mut self.scratch, ctx, pos, want_key, ConsumerSink(consumer))
    }

    /// Frees the scratch buffers.
    pub fn release_buffers(&mut self) {
        self.scratch.release();
    }

    /// Bytes currently reserved by scratch buffers.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }
}

fn resolve_with_sink<'s, S: ResultSink<'s>>(
    scratch: &'s mut Scratch,
    ctx: &TreeContext,
    pos: &Position,
    want_key: bool,
    sink: S,
) -> Result<S::Output> {
    let stats = ctx.stats();
    stats.inc_resolves();
    let page = pos.page();
    let slot = pos.slot();
    trace!(slot, want_key, has_update = pos.update.is_some(), "resolve.record");

    // The overlay is consulted before the key: a tombstone hides whatever is on the
    // page, including corrupt cells, and leaves prefix keys uninstantiated.
    let overlay = match resolve_overlay(pos.update()) {
        Ok(overlay) => overlay,
        Err(err) => {
            stats.inc_tombstones();
            trace!(slot, "resolve.tombstone");
            return Err(err);
        }
    };

    let key = if want_key {
        match page.layout() {
            Ok(PageLayout::RowLeaf) => Some(materialize_key(ctx, page, slot)?),
            Ok(_) => return Err(Error::Invalid("column pages carry no keys")),
            Err(err) => {
                warn!(tag = page.layout_tag(), slot, "layout.unknown");
                return Err(err);
            }
        }
    } else {
        None
    };

    let value = match overlay {
        Overlay::Value(bytes) => {
            stats.inc_overlay_hits();
            trace!(slot, len = bytes.len(), "resolve.overlay_hit");
            ValueRef::Borrowed(bytes)
        }
        Overlay::Absent => resolve_on_page(ctx, page, slot, &mut scratch.value)?,
    };
    sink.capture(scratch, stats, key, value)
}
