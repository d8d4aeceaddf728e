//! Per-layout value lookup.
//!
//! Every layout is handled in its own arm; an unrecognized tag is corruption.

use tracing::{trace, warn};

use crate::types::{Error, Result};

use super::cell::{self, resolve_value_cell};
use super::context::TreeContext;
use super::page::{Page, PageLayout, RLE_REPEAT_LEN};
use super::sink::ValueRef;

/// Resolves the on-page value at `slot`, decoding cells as the layout requires.
pub(crate) fn resolve_on_page<'p>(
    ctx: &TreeContext,
    page: &'p Page,
    slot: usize,
    scratch: &mut Vec<u8>,
) -> Result<ValueRef<'p>> {
    let layout = match page.layout() {
        Ok(layout) => layout,
        Err(err) => {
            warn!(tag = page.layout_tag(), slot, "layout.unknown");
            return Err(err);
        }
    };
    trace!(?layout, slot, "layout.resolve");
    match layout {
        PageLayout::ColumnFixed => fixed_item(page.slot_bytes(slot)?, page.fixed_len(), 0),
        PageLayout::ColumnRle => {
            fixed_item(page.slot_bytes(slot)?, page.fixed_len(), RLE_REPEAT_LEN)
        }
        PageLayout::ColumnVar => {
            let cell = cell::decode_cell(page.slot_bytes(slot)?)?;
            resolve_value_cell(ctx, cell, scratch)
        }
        PageLayout::RowLeaf => {
            if page.row(slot)?.has_empty_value() {
                return Ok(ValueRef::Borrowed(&[]));
            }
            match page.row_cells(slot)?.value {
                Some(cell) => resolve_value_cell(ctx, cell, scratch),
                None => Err(Error::IllegalFormat("row without value cell")),
            }
        }
    }
}

fn fixed_item(item: &[u8], fixed_len: usize, skip: usize) -> Result<ValueRef<'_>> {
    item.get(skip..skip + fixed_len)
        .map(ValueRef::Borrowed)
        .ok_or(Error::IllegalFormat("fixed item truncated"))
}
