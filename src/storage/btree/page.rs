use std::convert::TryFrom;
use std::sync::OnceLock;

use bytes::Bytes;
use smallvec::SmallVec;

use crate::types::{Error, Result};

use super::cell::{self, CellRef};

/// Number of bytes used by the page header (excluding the slot directory).
pub const PAGE_HEADER_LEN: usize = 8;

/// Size in bytes of a single slot directory entry (offset + length).
pub const SLOT_ENTRY_LEN: usize = 4;

/// Width of the repeat count that prefixes every run on a run-length-encoded page.
pub const RLE_REPEAT_LEN: usize = 4;

/// Row flag: the row has no value cell and resolves to an empty value.
pub const ROW_FLAG_EMPTY_VALUE: u8 = 0x01;

/// Largest page image addressable by u16 slot offsets.
pub const MAX_PAGE_LEN: usize = u16::MAX as usize;

const LAYOUT_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = 1;
const NSLOTS_OFFSET: usize = 2;
const FIXED_LEN_OFFSET: usize = 4;

/// On-page layout variants.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageLayout {
    /// Column store with fixed-size items addressed directly.
    ColumnFixed = 1,
    /// Column store with `repeat | value` runs.
    ColumnRle = 2,
    /// Column store with one cell per slot.
    ColumnVar = 3,
    /// Row store leaf with a key cell and an optional value cell per slot.
    RowLeaf = 4,
}

impl TryFrom<u8> for PageLayout {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(PageLayout::ColumnFixed),
            2 => Ok(PageLayout::ColumnRle),
            3 => Ok(PageLayout::ColumnVar),
            4 => Ok(PageLayout::RowLeaf),
            _ => Err(Error::IllegalFormat("unknown page layout")),
        }
    }
}

const INLINE_SLOT_EXTENTS: usize = 32;

#[derive(Clone, Copy, Debug, Default)]
struct SlotExtent {
    start: u16,
    end: u16,
}

/// Per-row state in a row-leaf page's arena.
///
/// The key cache is filled at most once with the instantiated key; racing writers
/// compute identical bytes and the loser's copy is dropped.
#[derive(Debug, Default)]
pub struct RowSlot {
    empty_value: bool,
    key_cache: OnceLock<Bytes>,
}

impl RowSlot {
    /// Whether the row carries the explicit empty-value marker.
    pub fn has_empty_value(&self) -> bool {
        self.empty_value
    }

    /// The instantiated key, if one has been cached.
    pub fn cached_key(&self) -> Option<&Bytes> {
        self.key_cache.get()
    }

    /// Stores `key` unless another thread got there first; returns whichever is cached.
    pub(crate) fn cache_key(&self, key: Bytes) -> Bytes {
        let _ = self.key_cache.set(key.clone());
        self.key_cache.get().cloned().unwrap_or(key)
    }
}

/// Key and value cells of one row.
#[derive(Clone, Copy, Debug)]
pub struct RowCells<'a> {
    /// The key cell.
    pub key: CellRef<'a>,
    /// The value cell; `None` when the row is marked empty.
    pub value: Option<CellRef<'a>>,
}

/// An immutable, decoded page image.
///
/// Pages are shared behind `Arc`; holding one keeps the image pinned. Nothing in this
/// crate mutates the image, only the row arena's key caches.
#[derive(Debug)]
pub struct Page {
    image: Bytes,
    layout_tag: u8,
    flags: u8,
    fixed_len: usize,
    extents: SmallVec<[SlotExtent; INLINE_SLOT_EXTENTS]>,
    rows: Box<[RowSlot]>,
}

impl Page {
    /// Parses a page image, validating the header and slot directory.
    ///
    /// An unknown layout tag is accepted here; resolving a slot on such a page fails.
    pub fn from_image(image: impl Into<Bytes>) -> Result<Self> {
        let image: Bytes = image.into();
        if image.len() < PAGE_HEADER_LEN {
            return Err(Error::IllegalFormat("page shorter than header"));
        }
        if image.len() > MAX_PAGE_LEN {
            return Err(Error::IllegalFormat("page larger than slot offsets allow"));
        }
        let layout_tag = image[LAYOUT_OFFSET];
        let flags = image[FLAGS_OFFSET];
        let slot_count = read_u16(&image, NSLOTS_OFFSET) as usize;
        let fixed_len = read_u32(&image, FIXED_LEN_OFFSET) as usize;
        let slot_bytes = slot_count * SLOT_ENTRY_LEN;
        if PAGE_HEADER_LEN + slot_bytes > image.len() {
            return Err(Error::IllegalFormat("slot directory larger than page"));
        }
        let dir_start = image.len() - slot_bytes;
        let extents = build_extents(&image, dir_start, slot_count)?;

        let layout = PageLayout::try_from(layout_tag).ok();
        for extent in &extents {
            let len = (extent.end - extent.start) as usize;
            match layout {
                Some(PageLayout::ColumnFixed) if len != fixed_len => {
                    return Err(Error::IllegalFormat("fixed item length mismatch"));
                }
                Some(PageLayout::ColumnRle) if len != RLE_REPEAT_LEN + fixed_len => {
                    return Err(Error::IllegalFormat("run length item length mismatch"));
                }
                _ => {}
            }
        }
        let rows = match layout {
            Some(PageLayout::RowLeaf) => extents
                .iter()
                .map(|extent| {
                    let flags = *image
                        .get(extent.start as usize)
                        .filter(|_| extent.end > extent.start)
                        .ok_or(Error::IllegalFormat("row record empty"))?;
                    Ok(RowSlot {
                        empty_value: flags & ROW_FLAG_EMPTY_VALUE != 0,
                        key_cache: OnceLock::new(),
                    })
                })
                .collect::<Result<Vec<_>>>()?
                .into_boxed_slice(),
            _ => Box::default(),
        };

        Ok(Self {
            image,
            layout_tag,
            flags,
            fixed_len,
            extents,
            rows,
        })
    }

    /// Raw layout tag from the header.
    pub fn layout_tag(&self) -> u8 {
        self.layout_tag
    }

    /// Decoded layout; unknown tags are `IllegalFormat`.
    pub fn layout(&self) -> Result<PageLayout> {
        PageLayout::try_from(self.layout_tag)
    }

    /// Header flags byte.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Item length for fixed and run-length-encoded layouts.
    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }

    /// Number of slots on the page.
    pub fn slot_count(&self) -> usize {
        self.extents.len()
    }

    /// The whole page image.
    pub fn image(&self) -> &Bytes {
        &self.image
    }

    /// Raw bytes addressed by `slot`.
    pub fn slot_bytes(&self, slot: usize) -> Result<&[u8]> {
        let extent = self
            .extents
            .get(slot)
            .ok_or(Error::Invalid("slot index out of range"))?;
        Ok(&self.image[extent.start as usize..extent.end as usize])
    }

    /// Row arena entry for `slot`; only row-leaf pages have one.
    pub fn row(&self, slot: usize) -> Result<&RowSlot> {
        if self.layout_tag != PageLayout::RowLeaf as u8 {
            return Err(Error::Invalid("page has no row index"));
        }
        self.rows
            .get(slot)
            .ok_or(Error::Invalid("slot index out of range"))
    }

    /// Decodes only the key cell of the row at `slot`.
    pub fn key_cell(&self, slot: usize) -> Result<CellRef<'_>> {
        self.row(slot)?;
        Ok(cell::split_cell(self.row_body(slot)?)?.0)
    }

    /// Decodes the row record at `slot` into its key and value cells.
    pub fn row_cells(&self, slot: usize) -> Result<RowCells<'_>> {
        let row = self.row(slot)?;
        let body = self.row_body(slot)?;
        let (key, used) = cell::split_cell(body)?;
        let rest = &body[used..];
        let value = if row.has_empty_value() {
            if !rest.is_empty() {
                return Err(Error::IllegalFormat("empty row carries a value cell"));
            }
            None
        } else {
            Some(cell::decode_cell(rest)?)
        };
        Ok(RowCells { key, value })
    }

    fn row_body(&self, slot: usize) -> Result<&[u8]> {
        self.slot_bytes(slot)?
            .get(1..)
            .ok_or(Error::IllegalFormat("row record empty"))
    }

    /// Maps a record offset within a run-length-encoded page to the slot of its run.
    ///
    /// Returns `None` when the offset lies past the last run.
    pub fn rle_slot_for(&self, record_offset: u64) -> Result<Option<usize>> {
        if self.layout()? != PageLayout::ColumnRle {
            return Err(Error::Invalid("page is not run-length encoded"));
        }
        let mut first = 0u64;
        for slot in 0..self.slot_count() {
            let bytes = self.slot_bytes(slot)?;
            let repeat = read_u32(bytes, 0) as u64;
            if record_offset < first + repeat {
                return Ok(Some(slot));
            }
            first += repeat;
        }
        Ok(None)
    }

    /// Total number of logical records on the page (runs expanded).
    pub fn record_count(&self) -> Result<u64> {
        match self.layout()? {
            PageLayout::ColumnRle => (0..self.slot_count()).try_fold(0u64, |total, slot| {
                Ok(total + read_u32(self.slot_bytes(slot)?, 0) as u64)
            }),
            _ => Ok(self.slot_count() as u64),
        }
    }
}

fn build_extents(
    image: &[u8],
    dir_start: usize,
    slot_count: usize,
) -> Result<SmallVec<[SlotExtent; INLINE_SLOT_EXTENTS]>> {
    let mut extents = SmallVec::with_capacity(slot_count);
    let mut ordered: SmallVec<[(usize, usize); INLINE_SLOT_EXTENTS]> =
        SmallVec::with_capacity(slot_count);
    for idx in 0..slot_count {
        let pos = dir_start + idx * SLOT_ENTRY_LEN;
        let start = read_u16(image, pos) as usize;
        let len = read_u16(image, pos + 2) as usize;
        if start < PAGE_HEADER_LEN {
            return Err(Error::IllegalFormat("slot overlaps page header"));
        }
        let end = start
            .checked_add(len)
            .ok_or(Error::IllegalFormat("slot extent overflow"))?;
        if end > dir_start {
            return Err(Error::IllegalFormat("slot extent beyond item region"));
        }
        extents.push(SlotExtent {
            start: start as u16,
            end: end as u16,
        });
        ordered.push((start, end));
    }
    ordered.sort_unstable_by_key(|entry| entry.0);
    let mut prev_end = PAGE_HEADER_LEN;
    for (start, end) in ordered {
        if start < prev_end {
            return Err(Error::IllegalFormat("slot extents overlap"));
        }
        prev_end = end;
    }
    Ok(extents)
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Builds page images in the format [`Page::from_image`] reads.
///
/// Items are appended after the header in push order; the slot directory is written
/// at the tail by [`PageBuilder::finish`].
pub struct PageBuilder {
    layout_tag: u8,
    fixed_len: u32,
    items: Vec<u8>,
    slots: Vec<(usize, usize)>,
}

impl PageBuilder {
    /// Starts a page with a known layout.
    pub fn new(layout: PageLayout, fixed_len: u32) -> Self {
        Self::with_tag(layout as u8, fixed_len)
    }

    /// Starts a page with an arbitrary layout tag.
    pub fn with_tag(layout_tag: u8, fixed_len: u32) -> Self {
        Self {
            layout_tag,
            fixed_len,
            items: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Appends raw slot bytes with no interpretation.
    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        let start = PAGE_HEADER_LEN + self.items.len();
        self.items.extend_from_slice(bytes);
        self.slots.push((start, bytes.len()));
        self
    }

    /// Appends a fixed-length item.
    pub fn push_fixed(&mut self, value: &[u8]) -> &mut Self {
        self.push_raw(value)
    }

    /// Appends a run of `repeat` identical records.
    pub fn push_run(&mut self, repeat: u32, value: &[u8]) -> &mut Self {
        let mut item = Vec::with_capacity(RLE_REPEAT_LEN + value.len());
        item.extend_from_slice(&repeat.to_be_bytes());
        item.extend_from_slice(value);
        self.push_raw(&item)
    }

    /// Appends an encoded cell as a variable-column slot.
    pub fn push_cell(&mut self, encoded_cell: &[u8]) -> &mut Self {
        self.push_raw(encoded_cell)
    }

    /// Appends a row; `value_cell == None` marks the row's value as empty.
    pub fn push_row(&mut self, key_cell: &[u8], value_cell: Option<&[u8]>) -> &mut Self {
        let mut record = Vec::with_capacity(1 + key_cell.len() + value_cell.map_or(0, <[u8]>::len));
        record.push(if value_cell.is_some() {
            0
        } else {
            ROW_FLAG_EMPTY_VALUE
        });
        record.extend_from_slice(key_cell);
        if let Some(value) = value_cell {
            record.extend_from_slice(value);
        }
        self.push_raw(&record)
    }

    /// Writes the image.
    pub fn finish(&self) -> Result<Bytes> {
        let slot_count = u16::try_from(self.slots.len())
            .map_err(|_| Error::Invalid("too many slots for one page"))?;
        let total = PAGE_HEADER_LEN + self.items.len() + self.slots.len() * SLOT_ENTRY_LEN;
        if total > MAX_PAGE_LEN {
            return Err(Error::Invalid("page image exceeds maximum page length"));
        }
        let mut image = Vec::with_capacity(total);
        image.push(self.layout_tag);
        image.push(0);
        image.extend_from_slice(&slot_count.to_be_bytes());
        image.extend_from_slice(&self.fixed_len.to_be_bytes());
        image.extend_from_slice(&self.items);
        for &(start, len) in &self.slots {
            image.extend_from_slice(&(start as u16).to_be_bytes());
            image.extend_from_slice(&(len as u16).to_be_bytes());
        }
        Ok(Bytes::from(image))
    }

    /// Writes the image and parses it.
    pub fn build(&self) -> Result<Page> {
        Page::from_image(self.finish()?)
    }
}
