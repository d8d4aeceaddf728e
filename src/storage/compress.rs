#![forbid(unsafe_code)]

use crate::types::DecodeError;

/// Decompression service configured per tree.
///
/// Implementations append the decoded form of `src` to `dst`; callers clear `dst` first.
pub trait Decoder: Send + Sync {
    /// Decodes `src`, appending the result to `dst`.
    fn decode(&self, src: &[u8], dst: &mut Vec<u8>) -> Result<(), DecodeError>;
}

/// Largest output a raw Snappy stream can produce per input byte, rounded up.
///
/// A three-byte copy element expands to at most 64 bytes; literals never expand.
const SNAPPY_MAX_EXPANSION: usize = 22;

/// Raw-format Snappy decoder.
///
/// The length header is checked against the input size before any buffer is grown.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnappyDecoder;

impl Decoder for SnappyDecoder {
    fn decode(&self, src: &[u8], dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        let len = snap::raw::decompress_len(src)?;
        if len > src.len().saturating_mul(SNAPPY_MAX_EXPANSION) {
            return Err(DecodeError::Corrupt(
                "snappy length header exceeds what the input can expand to",
            ));
        }
        let start = dst.len();
        dst.resize(start + len, 0);
        match snap::raw::Decoder::new().decompress(src, &mut dst[start..]) {
            Ok(written) => {
                dst.truncate(start + written);
                Ok(())
            }
            Err(err) => {
                dst.truncate(start);
                Err(err.into())
            }
        }
    }
}
