#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::storage::btree::TreeContext;
use crate::types::checksum::{overflow_crc32, verify_overflow};
use crate::types::{Error, FetchError, OverflowRef, PageId, Result};

/// Header written at the start of the first page of every file-backed overflow payload.
pub const OVERFLOW_HEADER_LEN: usize = 16;
const OVERFLOW_MAGIC: [u8; 4] = *b"OVFL";

/// Source of out-of-page payloads.
///
/// Implementations may block; the resolver propagates their failures without retrying.
pub trait OverflowStore: Send + Sync {
    /// Appends the stored bytes behind `reference` to `dst`.
    fn fetch_overflow(
        &self,
        reference: OverflowRef,
        dst: &mut Vec<u8>,
    ) -> std::result::Result<(), FetchError>;
}

/// Fetches the payload behind `reference` into `dst`, replacing its contents.
///
/// The fetched bytes are checked against the length and checksum the cell recorded.
pub(crate) fn fetch_into(
    ctx: &TreeContext,
    reference: OverflowRef,
    dst: &mut Vec<u8>,
) -> Result<()> {
    trace!(page = reference.page.0, len = reference.len, "overflow.fetch");
    ctx.stats().inc_overflow_fetches();
    dst.clear();
    ctx.overflow()
        .fetch_overflow(reference, dst)
        .and_then(|()| {
            verify_overflow(
                &dst[..],
                reference.len,
                reference.checksum,
                ctx.verify_overflow_checksums(),
            )
        })
        .map_err(|source| Error::OverflowFetchFailed { reference, source })
}

/// In-memory overflow store keyed by page id.
#[derive(Default)]
pub struct MemOverflowStore {
    pages: RwLock<HashMap<PageId, Bytes>>,
    next_page: AtomicU64,
    fetches: AtomicU64,
}

impl MemOverflowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `stored` under a fresh page id and returns the reference a cell would carry.
    pub fn insert(&self, stored: &[u8]) -> OverflowRef {
        let page = PageId(self.next_page.fetch_add(1, Ordering::Relaxed) + 1);
        self.put(page, Bytes::copy_from_slice(stored));
        OverflowRef {
            page,
            len: stored.len() as u32,
            checksum: overflow_crc32(stored),
        }
    }

    /// Stores raw bytes under `page`, replacing anything already there.
    pub fn put(&self, page: PageId, stored: Bytes) {
        self.pages.write().insert(page, stored);
    }

    /// Drops the payload stored under `page`.
    pub fn remove(&self, page: PageId) -> bool {
        self.pages.write().remove(&page).is_some()
    }

    /// Number of fetches served or attempted.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl OverflowStore for MemOverflowStore {
    fn fetch_overflow(
        &self,
        reference: OverflowRef,
        dst: &mut Vec<u8>,
    ) -> std::result::Result<(), FetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let pages = self.pages.read();
        let stored = pages
            .get(&reference.page)
            .ok_or(FetchError::Missing(reference.page))?;
        dst.extend_from_slice(stored);
        Ok(())
    }
}

/// Overflow store backed by a file of fixed-size pages.
///
/// A payload occupies contiguous pages starting at its reference page. The first page
/// begins with `magic "OVFL" | page:u64 | len:u32`, followed by the stored bytes.
pub struct FileOverflowStore {
    file: Mutex<File>,
    page_size: u64,
    next_page: AtomicU64,
}

impl FileOverflowStore {
    /// Creates (or truncates) an overflow file.
    pub fn create(path: impl AsRef<Path>, page_size: u32) -> Result<Self> {
        Self::check_page_size(page_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            page_size: page_size as u64,
            next_page: AtomicU64::new(0),
        })
    }

    /// Opens an existing overflow file for reading and appending.
    pub fn open(path: impl AsRef<Path>, page_size: u32) -> Result<Self> {
        Self::check_page_size(page_size)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let page_size = page_size as u64;
        Ok(Self {
            file: Mutex::new(file),
            page_size,
            next_page: AtomicU64::new(len.div_ceil(page_size)),
        })
    }

    /// Appends `stored` as a new payload and returns its reference.
    pub fn append(&self, stored: &[u8]) -> Result<OverflowRef> {
        let len = u32::try_from(stored.len())
            .map_err(|_| Error::Invalid("overflow payload longer than u32"))?;
        let total = (OVERFLOW_HEADER_LEN + stored.len()) as u64;
        let pages = total.div_ceil(self.page_size);
        let first = self.next_page.fetch_add(pages, Ordering::Relaxed);
        let mut image = Vec::with_capacity((pages * self.page_size) as usize);
        image.extend_from_slice(&OVERFLOW_MAGIC);
        image.extend_from_slice(&first.to_be_bytes());
        image.extend_from_slice(&len.to_be_bytes());
        image.extend_from_slice(stored);
        image.resize((pages * self.page_size) as usize, 0);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(first * self.page_size))?;
        file.write_all(&image)?;
        file.flush()?;
        Ok(OverflowRef {
            page: PageId(first),
            len,
            checksum: overflow_crc32(stored),
        })
    }

    /// Page size the file was laid out with.
    pub fn page_size(&self) -> u32 {
        self.page_size as u32
    }

    fn check_page_size(page_size: u32) -> Result<()> {
        if (page_size as usize) <= OVERFLOW_HEADER_LEN {
            return Err(Error::Invalid("overflow page size too small for header"));
        }
        Ok(())
    }
}

impl OverflowStore for FileOverflowStore {
    fn fetch_overflow(
        &self,
        reference: OverflowRef,
        dst: &mut Vec<u8>,
    ) -> std::result::Result<(), FetchError> {
        let offset = reference
            .page
            .0
            .checked_mul(self.page_size)
            .ok_or(FetchError::Missing(reference.page))?;
        let mut file = self.file.lock();
        let file_len = file.metadata()?.len();
        if offset >= file_len {
            return Err(FetchError::Missing(reference.page));
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; OVERFLOW_HEADER_LEN];
        file.read_exact(&mut header)?;
        if header[0..4] != OVERFLOW_MAGIC {
            return Err(FetchError::BadHeader("bad magic"));
        }
        let mut page = [0u8; 8];
        page.copy_from_slice(&header[4..12]);
        if u64::from_be_bytes(page) != reference.page.0 {
            return Err(FetchError::BadHeader("page number mismatch"));
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&header[12..16]);
        let len = u32::from_be_bytes(len);
        if len != reference.len {
            return Err(FetchError::LengthMismatch {
                expected: reference.len,
                actual: len as usize,
            });
        }
        if offset + OVERFLOW_HEADER_LEN as u64 + len as u64 > file_len {
            return Err(FetchError::BadHeader("payload runs past end of file"));
        }
        let start = dst.len();
        dst.resize(start + len as usize, 0);
        file.read_exact(&mut dst[start..])?;
        Ok(())
    }
}
