//! Cell codec: `type:u8 | len:varint | payload[len]`.

use std::convert::TryFrom;

use tracing::warn;

use crate::primitives::bytes::{buf::Cursor, var};
use crate::storage::overflow;
use crate::types::{Error, OverflowRef, Result};

use super::context::TreeContext;
use super::sink::ValueRef;

/// Type tag stored in the first byte of every cell.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CellKind {
    /// Flat key bytes, possibly compressed.
    Key = 1,
    /// Key stored out of page.
    KeyOverflow = 2,
    /// Key sharing a prefix with the previous row's key.
    KeyPrefix = 3,
    /// Inline value bytes, possibly compressed.
    Data = 4,
    /// Value stored out of page.
    DataOverflow = 5,
    /// Deleted item.
    Deleted = 6,
}

impl TryFrom<u8> for CellKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(CellKind::Key),
            2 => Ok(CellKind::KeyOverflow),
            3 => Ok(CellKind::KeyPrefix),
            4 => Ok(CellKind::Data),
            5 => Ok(CellKind::DataOverflow),
            6 => Ok(CellKind::Deleted),
            _ => Err(Error::IllegalFormat("unknown cell type")),
        }
    }
}

/// A decoded cell borrowing its payload from page memory.
#[derive(Clone, Copy, Debug)]
pub struct CellRef<'a> {
    /// Cell type.
    pub kind: CellKind,
    /// Raw payload (still compressed, or an encoded overflow reference).
    pub payload: &'a [u8],
}

impl<'a> CellRef<'a> {
    /// Decodes the overflow reference carried by an overflow cell.
    pub fn overflow_ref(&self) -> Result<OverflowRef> {
        match self.kind {
            CellKind::KeyOverflow | CellKind::DataOverflow => OverflowRef::decode(self.payload),
            _ => Err(Error::IllegalFormat("cell does not reference overflow")),
        }
    }

    /// Splits a prefix-compressed key payload into `(prefix_len, suffix)`.
    pub fn prefix_parts(&self) -> Result<(usize, &'a [u8])> {
        if self.kind != CellKind::KeyPrefix {
            return Err(Error::IllegalFormat("cell is not a prefix-compressed key"));
        }
        let mut cursor = Cursor::new(self.payload);
        let prefix_len = cursor.read_var_len("prefix key length truncated")?;
        Ok((prefix_len, cursor.rest()))
    }
}

/// Decodes the cell at the start of `buf`, returning it and the number of bytes it spans.
pub fn split_cell(buf: &[u8]) -> Result<(CellRef<'_>, usize)> {
    match read_cell(buf) {
        Ok(split) => Ok(split),
        Err(err) => {
            warn!(error = %err, first_byte = buf.first().copied(), "cell.illegal_format");
            Err(err)
        }
    }
}

fn read_cell(buf: &[u8]) -> Result<(CellRef<'_>, usize)> {
    let mut cursor = Cursor::new(buf);
    let kind = CellKind::try_from(cursor.read_u8("cell truncated before type")?)?;
    let len = cursor.read_var_len("cell length truncated")?;
    let payload = cursor.take(len, "cell payload truncated")?;
    Ok((CellRef { kind, payload }, cursor.position()))
}

/// Decodes a cell that must span `buf` exactly.
pub fn decode_cell(buf: &[u8]) -> Result<CellRef<'_>> {
    let (cell, used) = split_cell(buf)?;
    if used != buf.len() {
        warn!(used, len = buf.len(), "cell.trailing_bytes");
        return Err(Error::IllegalFormat("trailing bytes after cell"));
    }
    Ok(cell)
}

/// Appends a cell with an arbitrary type tag; used for image construction.
pub fn encode_raw_cell(tag: u8, payload: &[u8], dst: &mut Vec<u8>) {
    dst.push(tag);
    var::encode_u64(payload.len() as u64, dst);
    dst.extend_from_slice(payload);
}

/// Appends a cell of `kind` carrying `payload`.
pub fn encode_cell(kind: CellKind, payload: &[u8], dst: &mut Vec<u8>) {
    encode_raw_cell(kind as u8, payload, dst);
}

/// Appends an overflow cell (`KeyOverflow` or `DataOverflow`) for `reference`.
pub fn encode_overflow_cell(kind: CellKind, reference: OverflowRef, dst: &mut Vec<u8>) {
    debug_assert!(matches!(
        kind,
        CellKind::KeyOverflow | CellKind::DataOverflow
    ));
    let mut payload = Vec::with_capacity(OverflowRef::ENCODED_LEN);
    reference.encode(&mut payload);
    encode_cell(kind, &payload, dst);
}

/// Appends a prefix-compressed key cell.
pub fn encode_prefix_key_cell(prefix_len: usize, suffix: &[u8], dst: &mut Vec<u8>) {
    let mut payload = Vec::with_capacity(var::encoded_len_u64(prefix_len as u64) + suffix.len());
    var::encode_u64(prefix_len as u64, &mut payload);
    payload.extend_from_slice(suffix);
    encode_cell(CellKind::KeyPrefix, &payload, dst);
}

/// Resolves a value cell to bytes.
///
/// Uncompressed inline data stays in page memory; compressed or overflow data lands in
/// `scratch`.
pub(crate) fn resolve_value_cell<'p>(
    ctx: &TreeContext,
    cell: CellRef<'p>,
    scratch: &mut Vec<u8>,
) -> Result<ValueRef<'p>> {
    ctx.stats().inc_value_cell_decodes();
    match cell.kind {
        CellKind::Data => match ctx.value_decoder() {
            None => Ok(ValueRef::Borrowed(cell.payload)),
            Some(decoder) => {
                scratch.clear();
                decoder.decode(cell.payload, scratch)?;
                ctx.stats().inc_decompressions();
                Ok(ValueRef::Scratch)
            }
        },
        CellKind::DataOverflow => {
            let reference = cell.overflow_ref()?;
            match ctx.value_decoder() {
                None => overflow::fetch_into(ctx, reference, scratch)?,
                Some(decoder) => {
                    let mut stored = Vec::new();
                    overflow::fetch_into(ctx, reference, &mut stored)?;
                    scratch.clear();
                    decoder.decode(&stored, scratch)?;
                    ctx.stats().inc_decompressions();
                }
            }
            Ok(ValueRef::Scratch)
        }
        CellKind::Deleted => {
            warn!(kind = ?cell.kind, "cell.illegal_value_cell");
            Err(Error::IllegalFormat("deleted cell in value position"))
        }
        CellKind::Key | CellKind::KeyOverflow | CellKind::KeyPrefix => {
            warn!(kind = ?cell.kind, "cell.illegal_value_cell");
            Err(Error::IllegalFormat("key cell in value position"))
        }
    }
}
