//! In-memory update chains and the overlay check that precedes any page decoding.

use std::sync::Arc;

use bytes::Bytes;

use crate::types::{Error, Result};

/// What a single update does to its slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UpdatePayload {
    /// The slot's new value.
    Value(Bytes),
    /// The slot was deleted.
    Tombstone,
}

/// One entry of a most-recent-first update chain.
///
/// Chains are owned by the write path; the resolver only reads the head it is handed.
#[derive(Clone, Debug)]
pub struct Update {
    payload: UpdatePayload,
    next: Option<Arc<Update>>,
}

impl Update {
    /// A live update carrying `data`.
    pub fn value(data: impl Into<Bytes>) -> Self {
        Self {
            payload: UpdatePayload::Value(data.into()),
            next: None,
        }
    }

    /// A deletion.
    pub fn tombstone() -> Self {
        Self {
            payload: UpdatePayload::Tombstone,
            next: None,
        }
    }

    /// Links `older` behind this update.
    pub fn with_next(mut self, older: Arc<Update>) -> Self {
        self.next = Some(older);
        self
    }

    /// Whether this update deletes the record.
    pub fn is_deleted(&self) -> bool {
        matches!(self.payload, UpdatePayload::Tombstone)
    }

    /// Value bytes of a live update.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            UpdatePayload::Value(bytes) => Some(&bytes[..]),
            UpdatePayload::Tombstone => None,
        }
    }

    /// Length of the value bytes; zero for a tombstone.
    pub fn size(&self) -> usize {
        self.data().map_or(0, <[u8]>::len)
    }

    /// The payload.
    pub fn payload(&self) -> &UpdatePayload {
        &self.payload
    }

    /// The next older update, if any.
    pub fn next(&self) -> Option<&Arc<Update>> {
        self.next.as_ref()
    }
}

/// Outcome of consulting the update chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Overlay<'a> {
    /// No update; resolve from the page.
    Absent,
    /// The head update's bytes, which fully shadow the page.
    Value(&'a [u8]),
}

/// Resolves the value visible through the head of an update chain.
///
/// Only the head matters: a tombstone fails with `NotFound`, a live update wins outright.
pub fn resolve_overlay(head: Option<&Update>) -> Result<Overlay<'_>> {
    match head.map(Update::payload) {
        None => Ok(Overlay::Absent),
        Some(UpdatePayload::Tombstone) => Err(Error::NotFound),
        Some(UpdatePayload::Value(bytes)) => Ok(Overlay::Value(&bytes[..])),
    }
}
