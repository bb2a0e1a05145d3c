//! Typed iterator over a point-in-time view of a store.

use crate::backend::BackendCursor;
use crate::error::StoreResult;
use crate::obfuscate::Obfuscation;
use strata_codec::{Decode, Encode};
use tracing::debug;

/// An ordered iterator bound to a snapshot of a [`Store`](crate::Store).
///
/// The iterator never observes writes committed after its creation. It
/// traverses the raw key space, including reserved bookkeeping entries and
/// partition-prefixed keys; callers typically seek to their own key prefix
/// rather than starting from the very first entry. Partition-fallback
/// lookup applies only to point reads, not iteration.
pub struct Iter {
    inner: Box<dyn BackendCursor>,
    obfuscation: Obfuscation,
}

impl Iter {
    pub(crate) fn new(inner: Box<dyn BackendCursor>, obfuscation: Obfuscation) -> Self {
        Self { inner, obfuscation }
    }

    /// Positions at the first entry with key >= `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the engine read fails.
    pub fn seek<K: Encode>(&mut self, key: &K) -> StoreResult<()> {
        let key_bytes = key.encode()?;
        self.inner.seek(&key_bytes)
    }

    /// Positions at the lowest key in the store.
    pub fn seek_to_first(&mut self) -> StoreResult<()> {
        self.inner.seek_to_first()
    }

    /// Returns true if the iterator currently references an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.inner.valid()
    }

    /// Advances one entry forward.
    ///
    /// Callers must check [`valid`](Self::valid) before reading the entry.
    pub fn next(&mut self) -> StoreResult<()> {
        self.inner.next()
    }

    /// Decodes the current entry's key, or `None` if the iterator is
    /// invalid or the key does not decode as `K`.
    #[must_use]
    pub fn key<K: Decode>(&self) -> Option<K> {
        let raw = self.inner.key()?;
        match K::decode(raw) {
            Ok(key) => Some(key),
            Err(error) => {
                debug!(%error, "iterator key failed to decode");
                None
            }
        }
    }

    /// Decodes the current entry's value, de-obfuscating it first, or
    /// `None` if the iterator is invalid or the value does not decode.
    #[must_use]
    pub fn value<V: Decode>(&self) -> Option<V> {
        let mut raw = self.inner.value()?.to_vec();
        self.obfuscation.apply(&mut raw);
        match V::decode(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(%error, "iterator value failed to decode");
                None
            }
        }
    }
}
