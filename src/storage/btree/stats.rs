use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::Serialize;

/// Snapshot of resolver statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, Serialize)]
pub struct ResolveStatsSnapshot {
    /// Number of resolve calls started
    pub resolves: u64,
    /// Number of calls answered by a live update
    pub overlay_hits: u64,
    /// Number of calls shadowed by a tombstone
    pub tombstones: u64,
    /// Number of value cells decoded from page memory
    pub value_cell_decodes: u64,
    /// Number of overflow fetches issued
    pub overflow_fetches: u64,
    /// Number of key or value decompressions performed
    pub decompressions: u64,
    /// Number of keys decoded into a row's key cache
    pub key_instantiations: u64,
    /// Number of key requests served from a row's key cache
    pub key_cache_hits: u64,
    /// Number of copies into session scratch buffers
    pub scratch_copies: u64,
    /// Total bytes copied into session scratch buffers
    pub bytes_copied: u64,
}

/// Thread-safe statistics shared by every resolve call against one tree.
#[derive(Default)]
pub struct ResolveStats {
    resolves: AtomicU64,
    overlay_hits: AtomicU64,
    tombstones: AtomicU64,
    value_cell_decodes: AtomicU64,
    overflow_fetches: AtomicU64,
    decompressions: AtomicU64,
    key_instantiations: AtomicU64,
    key_cache_hits: AtomicU64,
    scratch_copies: AtomicU64,
    bytes_copied: AtomicU64,
}

impl ResolveStats {
    /// Returns the number of value cells decoded so far.
    pub fn value_cell_decodes(&self) -> u64 {
        self.value_cell_decodes.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of overflow fetches issued so far.
    pub fn overflow_fetches(&self) -> u64 {
        self.overflow_fetches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of key instantiations so far.
    pub fn key_instantiations(&self) -> u64 {
        self.key_instantiations.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_resolves(&self) {
        self.resolves.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_overlay_hits(&self) {
        self.overlay_hits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_tombstones(&self) {
        self.tombstones.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_value_cell_decodes(&self) {
        self.value_cell_decodes
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_overflow_fetches(&self) {
        self.overflow_fetches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_decompressions(&self) {
        self.decompressions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_key_instantiations(&self) {
        self.key_instantiations
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_key_cache_hits(&self) {
        self.key_cache_hits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn record_scratch_copy(&self, bytes: usize) {
        self.scratch_copies.fetch_add(1, AtomicOrdering::Relaxed);
        if bytes > 0 {
            self.bytes_copied
                .fetch_add(bytes as u64, AtomicOrdering::Relaxed);
        }
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> ResolveStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(AtomicOrdering::Relaxed);
        ResolveStatsSnapshot {
            resolves: load(&self.resolves),
            overlay_hits: load(&self.overlay_hits),
            tombstones: load(&self.tombstones),
            value_cell_decodes: load(&self.value_cell_decodes),
            overflow_fetches: load(&self.overflow_fetches),
            decompressions: load(&self.decompressions),
            key_instantiations: load(&self.key_instantiations),
            key_cache_hits: load(&self.key_cache_hits),
            scratch_copies: load(&self.scratch_copies),
            bytes_copied: load(&self.bytes_copied),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "leafmat::stats",
            resolves = snapshot.resolves,
            overlay_hits = snapshot.overlay_hits,
            tombstones = snapshot.tombstones,
            value_cell_decodes = snapshot.value_cell_decodes,
            overflow_fetches = snapshot.overflow_fetches,
            decompressions = snapshot.decompressions,
            key_instantiations = snapshot.key_instantiations,
            key_cache_hits = snapshot.key_cache_hits,
            scratch_copies = snapshot.scratch_copies,
            bytes_copied = snapshot.bytes_copied,
            "resolve stats snapshot"
        );
    }
}
