//! Key materialization for row-leaf pages.
//!
//! Flat keys are returned as page views. Keys that need processing (overflow,
//! prefix-compressed, or compressed by the tree's key codec) are decoded once and
//! cached on the row, since cursors revisit keys far more often than values.

use bytes::Bytes;
use tracing::debug;

use crate::storage::overflow;
use crate::types::{Error, Result};

use super::cell::{CellKind, CellRef};
use super::context::TreeContext;
use super::page::Page;
use super::sink::KeyRef;

/// Whether a key stored in `cell` must be instantiated before use.
pub fn key_needs_processing(ctx: &TreeContext, cell: &CellRef<'_>) -> Result<bool> {
    match cell.kind {
        CellKind::KeyOverflow | CellKind::KeyPrefix => Ok(true),
        CellKind::Key => Ok(ctx.key_decoder().is_some()),
        CellKind::Data | CellKind::DataOverflow | CellKind::Deleted => {
            Err(Error::IllegalFormat("value cell in key position"))
        }
    }
}

/// Produces the key for `slot` on a row-leaf page.
pub(crate) fn materialize_key<'p>(
    ctx: &TreeContext,
    page: &'p Page,
    slot: usize,
) -> Result<KeyRef<'p>> {
    let row = page.row(slot)?;
    if let Some(key) = row.cached_key() {
        ctx.stats().inc_key_cache_hits();
        return Ok(KeyRef::Instantiated(key.clone()));
    }
    let cell = page.key_cell(slot)?;
    if key_needs_processing(ctx, &cell)? {
        return instantiate_key(ctx, page, slot).map(KeyRef::Instantiated);
    }
    Ok(KeyRef::Borrowed(cell.payload))
}

/// Decodes the key at `slot` into the row's cache and returns it.
///
/// Prefix-compressed keys depend on their predecessor, so this walks back to the
/// nearest row whose full key is known and builds forward, caching each processed key.
pub fn instantiate_key(ctx: &TreeContext, page: &Page, slot: usize) -> Result<Bytes> {
    let mut base = slot;
    let mut base_key = loop {
        let row = page.row(base)?;
        if let Some(key) = row.cached_key() {
            break key.clone();
        }
        let cell = page.key_cell(base)?;
        if cell.kind != CellKind::KeyPrefix {
            let key = decode_full_key(ctx, page, cell)?;
            break if key_needs_processing(ctx, &cell)? {
                ctx.stats().inc_key_instantiations();
                row.cache_key(key)
            } else {
                key
            };
        }
        if base == 0 {
            return Err(Error::IllegalFormat("prefix-compressed key in first row"));
        }
        base -= 1;
    };
    for idx in base + 1..=slot {
        let cell = page.key_cell(idx)?;
        let (prefix_len, suffix) = cell.prefix_parts()?;
        let prefix = base_key
            .get(..prefix_len)
            .ok_or(Error::IllegalFormat("key prefix longer than previous key"))?;
        let mut full = Vec::with_capacity(prefix_len + suffix.len());
        full.extend_from_slice(prefix);
        decode_key_bytes(ctx, suffix, &mut full)?;
        ctx.stats().inc_key_instantiations();
        base_key = page.row(idx)?.cache_key(Bytes::from(full));
    }
    debug!(slot, base, len = base_key.len(), "key.instantiate");
    Ok(base_key)
}

fn decode_full_key(ctx: &TreeContext, page: &Page, cell: CellRef<'_>) -> Result<Bytes> {
    match cell.kind {
        CellKind::Key => match ctx.key_decoder() {
            None => Ok(page.image().slice_ref(cell.payload)),
            Some(_) => {
                let mut out = Vec::new();
                decode_key_bytes(ctx, cell.payload, &mut out)?;
                Ok(Bytes::from(out))
            }
        },
        CellKind::KeyOverflow => {
            let mut stored = Vec::new();
            overflow::fetch_into(ctx, cell.overflow_ref()?, &mut stored)?;
            if ctx.key_decoder().is_none() {
                return Ok(Bytes::from(stored));
            }
            let mut out = Vec::new();
            decode_key_bytes(ctx, &stored, &mut out)?;
            Ok(Bytes::from(out))
        }
        _ => Err(Error::IllegalFormat("cell is not a full key")),
    }
}

fn decode_key_bytes(ctx: &TreeContext, stored: &[u8], dst: &mut Vec<u8>) -> Result<()> {
    match ctx.key_decoder() {
        None => dst.extend_from_slice(stored),
        Some(decoder) => {
            decoder.decode(stored, dst)?;
            ctx.stats().inc_decompressions();
        }
    }
    Ok(())
}
