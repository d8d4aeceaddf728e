//! Result delivery: copy into session scratch, or forward zero-copy views to a consumer.

use bytes::Bytes;

use crate::types::{ConsumerError, Error, Result};

use super::stats::ResolveStats;

/// Where a resolved value lives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueRef<'p> {
    /// Page or update memory, valid only while the position is held.
    Borrowed(&'p [u8]),
    /// Already materialized in the session's value scratch buffer.
    Scratch,
}

/// Where a resolved key lives.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyRef<'p> {
    /// A flat key in page memory, valid only while the page is held.
    Borrowed(&'p [u8]),
    /// An instantiated key from the row's cache; independent of the page pin.
    Instantiated(Bytes),
}

impl<'p> KeyRef<'p> {
    /// The key bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            KeyRef::Borrowed(bytes) => bytes,
            KeyRef::Instantiated(bytes) => bytes,
        }
    }
}

/// Session-owned buffers that back copied-out records.
#[derive(Debug, Default)]
pub struct Scratch {
    pub(crate) key: Vec<u8>,
    pub(crate) value: Vec<u8>,
    pub(crate) shared_key: Option<Bytes>,
}

impl Scratch {
    /// Frees every buffer.
    pub(crate) fn release(&mut self) {
        *self = Self::default();
    }

    /// Bytes currently reserved by the key and value buffers.
    pub(crate) fn capacity(&self) -> usize {
        self.key.capacity() + self.value.capacity()
    }
}

/// A key/value pair copied out into session-owned storage.
///
/// Valid until the session resolves another record or releases its buffers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Record<'s> {
    key: Option<&'s [u8]>,
    value: &'s [u8],
}

impl<'s> Record<'s> {
    /// Key bytes, when the key was requested.
    pub fn key(&self) -> Option<&'s [u8]> {
        self.key
    }

    /// Value bytes.
    pub fn value(&self) -> &'s [u8] {
        self.value
    }

    /// Copies the record into owned vectors.
    pub fn to_owned_parts(&self) -> (Option<Vec<u8>>, Vec<u8>) {
        (self.key.map(<[u8]>::to_vec), self.value.to_vec())
    }
}

/// Final step of a resolve call: deliver the key/value pair somewhere.
pub trait ResultSink<'s> {
    /// What the resolve call returns on success.
    type Output;

    /// Delivers `key` and `value`; bytes behind [`ValueRef::Scratch`] live in `scratch.value`.
    fn capture<'p>(
        self,
        scratch: &'s mut Scratch,
        stats: &ResolveStats,
        key: Option<KeyRef<'p>>,
        value: ValueRef<'p>,
    ) -> Result<Self::Output>;
}

/// Copies borrowed bytes into session scratch so the record outlives the page pin.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopySink;

enum KeyHome {
    Buffer,
    Shared,
}

impl<'s> ResultSink<'s> for CopySink {
    type Output = Record<'s>;

    fn capture<'p>(
        self,
        scratch: &'s mut Scratch,
        stats: &ResolveStats,
        key: Option<KeyRef<'p>>,
        value: ValueRef<'p>,
    ) -> Result<Record<'s>> {
        let key_home = match key {
            None => None,
            Some(KeyRef::Borrowed(bytes)) => {
                scratch.key.clear();
                scratch.key.extend_from_slice(bytes);
                scratch.shared_key = None;
                stats.record_scratch_copy(bytes.len());
                Some(KeyHome::Buffer)
            }
            Some(KeyRef::Instantiated(bytes)) => {
                scratch.shared_key = Some(bytes);
                Some(KeyHome::Shared)
            }
        };
        if let ValueRef::Borrowed(bytes) = value {
            scratch.value.clear();
            scratch.value.extend_from_slice(bytes);
            stats.record_scratch_copy(bytes.len());
        }
        let scratch: &'s Scratch = scratch;
        let key = match key_home {
            None => None,
            Some(KeyHome::Buffer) => Some(scratch.key.as_slice()),
            Some(KeyHome::Shared) => scratch.shared_key.as_deref(),
        };
        Ok(Record {
            key,
            value: scratch.value.as_slice(),
        })
    }
}

/// Hands borrowed views straight to a caller-supplied consumer.
///
/// The views are valid only for the duration of the consumer call; the consumer's
/// error becomes the resolve call's error.
pub struct ConsumerSink<F>(pub F);

impl<'s, F> ResultSink<'s> for ConsumerSink<F>
where
    F: FnOnce(Option<&[u8]>, &[u8]) -> std::result::Result<(), ConsumerError>,
{
    type Output = ();

    fn capture<'p>(
        self,
        scratch: &'s mut Scratch,
        _stats: &ResolveStats,
        key: Option<KeyRef<'p>>,
        value: ValueRef<'p>,
    ) -> Result<()> {
        let value = match value {
            ValueRef::Borrowed(bytes) => bytes,
            ValueRef::Scratch => scratch.value.as_slice(),
        };
        (self.0)(key.as_ref().map(KeyRef::as_slice), value).map_err(Error::ConsumerFailed)
    }
}
