#![forbid(unsafe_code)]
//! Varint and slice-cursor utilities shared by the page and cell codecs.

pub mod var {
    //! Unsigned LEB128-style varints.

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Number of bytes [`encode_u64`] writes for `value`.
    pub fn encoded_len_u64(mut value: u64) -> usize {
        let mut len = 1;
        while value >= 0x80 {
            value >>= 7;
            len += 1;
        }
        len
    }
}

pub mod buf {
    //! A fallible slice-backed cursor for parsing page-resident bytes.

    use crate::types::{Error, Result};

    /// Cursor over borrowed bytes; every read reports truncation as `IllegalFormat`.
    #[derive(Clone, Copy, Debug)]
    pub struct Cursor<'a> {
        buf: &'a [u8],
        pos: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, pos: 0 }
        }

        /// Current read offset.
        pub fn position(&self) -> usize {
            self.pos
        }

        /// Bytes left after the current offset.
        pub fn remaining(&self) -> usize {
            self.buf.len() - self.pos
        }

        /// Reads a single byte.
        pub fn read_u8(&mut self, truncated_msg: &'static str) -> Result<u8> {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or(Error::IllegalFormat(truncated_msg))?;
            self.pos += 1;
            Ok(byte)
        }

        /// Reads an unsigned varint, returning `truncated_msg` if input ends early.
        pub fn read_var_u64(&mut self, truncated_msg: &'static str) -> Result<u64> {
            let mut result = 0u64;
            let mut shift = 0u32;
            for _ in 0..10 {
                let byte = self.read_u8(truncated_msg)?;
                result |= ((byte & 0x7f) as u64) << shift;
                if (byte & 0x80) == 0 {
                    return Ok(result);
                }
                shift += 7;
            }
            Err(Error::IllegalFormat("varint too long"))
        }

        /// Reads a varint that must fit in `usize`.
        pub fn read_var_len(&mut self, truncated_msg: &'static str) -> Result<usize> {
            let raw = self.read_var_u64(truncated_msg)?;
            usize::try_from(raw).map_err(|_| Error::IllegalFormat("varint length exceeds usize"))
        }

        /// Takes `len` bytes from the cursor without copying.
        pub fn take(&mut self, len: usize, truncated_msg: &'static str) -> Result<&'a [u8]> {
            if len > self.remaining() {
                return Err(Error::IllegalFormat(truncated_msg));
            }
            let end = self.pos + len;
            let slice = &self.buf[self.pos..end];
            self.pos = end;
            Ok(slice)
        }

        /// Returns everything after the current offset and exhausts the cursor.
        pub fn rest(&mut self) -> &'a [u8] {
            let slice = &self.buf[self.pos..];
            self.pos = self.buf.len();
            slice
        }
    }
}
