use std::sync::Arc;

use crate::storage::compress::Decoder;
use crate::storage::options::ResolverOptions;
use crate::storage::overflow::OverflowStore;

use super::stats::ResolveStats;

/// Per-tree collaborators and configuration shared by every resolve call on that tree.
#[derive(Clone)]
pub struct TreeContext {
    overflow: Arc<dyn OverflowStore>,
    value_decoder: Option<Arc<dyn Decoder>>,
    key_decoder: Option<Arc<dyn Decoder>>,
    verify_overflow_checksums: bool,
    stats: Arc<ResolveStats>,
}

impl TreeContext {
    /// Builds a context from options, instantiating the configured decoders.
    pub fn new(overflow: Arc<dyn OverflowStore>, options: ResolverOptions) -> Self {
        Self {
            overflow,
            value_decoder: options.value_codec.decoder(),
            key_decoder: options.key_codec.decoder(),
            verify_overflow_checksums: options.verify_overflow_checksums,
            stats: Arc::new(ResolveStats::default()),
        }
    }

    /// Replaces the value decoder.
    pub fn with_value_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.value_decoder = Some(decoder);
        self
    }

    /// Replaces the key decoder.
    pub fn with_key_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.key_decoder = Some(decoder);
        self
    }

    /// Overflow store consulted for overflow cells.
    pub fn overflow(&self) -> &dyn OverflowStore {
        self.overflow.as_ref()
    }

    /// Decoder for compressed values, if values are compressed.
    pub fn value_decoder(&self) -> Option<&dyn Decoder> {
        self.value_decoder.as_deref()
    }

    /// Decoder for compressed keys, if keys are compressed.
    pub fn key_decoder(&self) -> Option<&dyn Decoder> {
        self.key_decoder.as_deref()
    }

    /// Whether fetched overflow payloads are checksummed.
    pub fn verify_overflow_checksums(&self) -> bool {
        self.verify_overflow_checksums
    }

    /// Counters for this tree.
    pub fn stats(&self) -> &ResolveStats {
        &self.stats
    }
}
