//! Low-level primitives shared by the page and cell codecs.

/// Byte-level utilities and encoding/decoding.
///
/// Varints plus a fallible cursor over page-resident bytes.
pub mod bytes;
