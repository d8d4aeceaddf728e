#![forbid(unsafe_code)]
//! Identifiers, overflow references, and the crate-wide error type.

use std::fmt;
use std::io;

/// Checksum helpers for out-of-page payloads.
pub mod checksum;

/// Identifier of a page in the overflow store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference stored inside an overflow cell: where the payload lives and what it should look like.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct OverflowRef {
    /// First page of the out-of-page payload.
    pub page: PageId,
    /// Stored length in bytes (before any decompression).
    pub len: u32,
    /// CRC32 of the stored bytes.
    pub checksum: u32,
}

impl OverflowRef {
    /// Encoded size of a reference inside a cell payload.
    pub const ENCODED_LEN: usize = 16;

    /// Appends the `page:u64 | len:u32 | crc32:u32` encoding to `dst`.
    pub fn encode(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.page.0.to_be_bytes());
        dst.extend_from_slice(&self.len.to_be_bytes());
        dst.extend_from_slice(&self.checksum.to_be_bytes());
    }

    /// Decodes a reference from an overflow cell payload.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() != Self::ENCODED_LEN {
            return Err(Error::IllegalFormat("overflow reference has wrong length"));
        }
        let mut page = [0u8; 8];
        let mut len = [0u8; 4];
        let mut checksum = [0u8; 4];
        page.copy_from_slice(&src[0..8]);
        len.copy_from_slice(&src[8..12]);
        checksum.copy_from_slice(&src[12..16]);
        Ok(Self {
            page: PageId(u64::from_be_bytes(page)),
            len: u32::from_be_bytes(len),
            checksum: u32::from_be_bytes(checksum),
        })
    }
}

impl fmt::Display for OverflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overflow(page={}, len={})", self.page, self.len)
    }
}

/// Failure reported by an overflow store or by verification of what it returned.
#[allow(missing_docs)]
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    #[error("overflow page {0} missing")]
    Missing(PageId),
    #[error("overflow page header invalid: {0}")]
    BadHeader(&'static str),
    #[error("overflow length mismatch (expected {expected}, fetched {actual})")]
    LengthMismatch { expected: u32, actual: usize },
    #[error("overflow checksum mismatch (expected {expected:#010x}, computed {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Failure reported by a decompression service.
#[allow(missing_docs)]
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("snappy: {0}")]
    Snappy(#[from] snap::Error),
    #[error("{0}")]
    Corrupt(&'static str),
}

/// Error returned by a zero-copy consumer; propagated unchanged.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while resolving a record.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Local I/O outside the overflow path (building images, opening stores).
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    /// The position is shadowed by a tombstone.
    #[error("not found")]
    NotFound,
    /// Unrecognized or malformed on-page data.
    #[error("illegal format: {0}")]
    IllegalFormat(&'static str),
    /// The caller asked for something the page cannot provide.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The overflow store failed, or returned bytes that do not match the reference.
    #[error("fetch of {reference} failed: {source}")]
    OverflowFetchFailed {
        /// Reference carried by the cell.
        reference: OverflowRef,
        /// What went wrong.
        #[source]
        source: FetchError,
    },
    /// A configured decompressor rejected its input.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// The zero-copy consumer returned an error.
    #[error("consumer failed: {0}")]
    ConsumerFailed(#[source] ConsumerError),
}

impl Error {
    /// True when the record was shadowed by a tombstone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
