use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::compress::{Decoder, SnappyDecoder};

/// Compression applied to stored keys or values of a tree.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Bytes are stored as-is.
    #[default]
    None,
    /// Bytes are stored in raw Snappy format.
    Snappy,
}

impl CodecKind {
    /// Builds the decoder for this codec, if any.
    pub fn decoder(self) -> Option<Arc<dyn Decoder>> {
        match self {
            CodecKind::None => None,
            CodecKind::Snappy => Some(Arc::new(SnappyDecoder)),
        }
    }
}

/// Per-tree configuration consumed by [`super::btree::TreeContext`].
#[derive(Clone, Debug)]
pub struct ResolverOptions {
    /// Codec applied to Data and DataOverflow cells on variable-column and row-leaf pages.
    pub value_codec: CodecKind,
    /// Codec applied to stored key bytes; any codec forces key instantiation.
    pub key_codec: CodecKind,
    /// Whether fetched overflow payloads are checked against the CRC in their reference.
    pub verify_overflow_checksums: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            value_codec: CodecKind::None,
            key_codec: CodecKind::None,
            verify_overflow_checksums: true,
        }
    }
}

impl ResolverOptions {
    /// Creates options with no compression and checksum verification enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value codec.
    pub fn value_codec(mut self, codec: CodecKind) -> Self {
        self.value_codec = codec;
        self
    }

    /// Sets the key codec.
    pub fn key_codec(mut self, codec: CodecKind) -> Self {
        self.key_codec = codec;
        self
    }

    /// Enables or disables overflow checksum verification.
    pub fn verify_overflow_checksums(mut self, enabled: bool) -> Self {
        self.verify_overflow_checksums = enabled;
        self
    }
}
