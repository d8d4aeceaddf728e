#![forbid(unsafe_code)]

use crate::types::FetchError;

/// Incremental 32-bit checksum.
pub trait Checksum {
    /// Feeds `bytes` into the checksum.
    fn update(&mut self, bytes: &[u8]);
    /// Returns the checksum of everything fed so far.
    fn finalize(&self) -> u32;
}

/// CRC32 (IEEE) backed by `crc32fast`.
pub struct Crc32Fast {
    inner: crc32fast::Hasher,
}

impl Default for Crc32Fast {
    fn default() -> Self {
        Self {
            inner: crc32fast::Hasher::new(),
        }
    }
}

impl Checksum for Crc32Fast {
    fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    fn finalize(&self) -> u32 {
        self.inner.clone().finalize()
    }
}

/// CRC32 recorded in an overflow reference for `stored` bytes.
pub fn overflow_crc32(stored: &[u8]) -> u32 {
    let mut hasher = Crc32Fast::default();
    hasher.update(stored);
    hasher.finalize()
}

/// Checks fetched overflow bytes against the length and checksum the cell promised.
pub fn verify_overflow(
    stored: &[u8],
    expected_len: u32,
    expected_crc: u32,
    check_crc: bool,
) -> Result<(), FetchError> {
    if stored.len() != expected_len as usize {
        return Err(FetchError::LengthMismatch {
            expected: expected_len,
            actual: stored.len(),
        });
    }
    if check_crc {
        let actual = overflow_crc32(stored);
        if actual != expected_crc {
            return Err(FetchError::ChecksumMismatch {
                expected: expected_crc,
                actual,
            });
        }
    }
    Ok(())
}
