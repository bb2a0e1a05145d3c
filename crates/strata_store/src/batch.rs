//! Typed batch of staged write and erase operations.

use crate::backend::BackendBatch;
use crate::error::StoreResult;
use crate::obfuscate::Obfuscation;
use strata_codec::Encode;

/// A batch of changes queued to be written to a [`Store`](crate::Store).
///
/// Keys and values are serialized (and values obfuscated) immediately when
/// staged, so the caller's objects can be freely mutated or dropped after
/// the call returns. Nothing becomes visible until the batch is passed to
/// [`Store::write_batch`](crate::Store::write_batch); dropping an
/// uncommitted batch leaves the store unchanged.
pub struct Batch {
    pub(crate) inner: Box<dyn BackendBatch>,
    obfuscation: Obfuscation,
}

impl Batch {
    pub(crate) fn new(inner: Box<dyn BackendBatch>, obfuscation: Obfuscation) -> Self {
        Self { inner, obfuscation }
    }

    /// Stages a write of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the engine rejects the staged
    /// operation.
    pub fn write<K: Encode, V: Encode>(&mut self, key: &K, value: &V) -> StoreResult<()> {
        self.write_impl(key, value, false)
    }

    /// Stages a write under a sorted (partition-prefixed) key.
    ///
    /// On engines without partition support this behaves like
    /// [`write`](Self::write).
    pub fn write_sorted<K: Encode, V: Encode>(&mut self, key: &K, value: &V) -> StoreResult<()> {
        self.write_impl(key, value, true)
    }

    /// Stages a deletion of `key`.
    pub fn erase<K: Encode>(&mut self, key: &K) -> StoreResult<()> {
        self.erase_impl(key, false)
    }

    /// Stages a deletion of a sorted key, recorded as an explicit tombstone
    /// on partition-capable engines.
    pub fn erase_sorted<K: Encode>(&mut self, key: &K) -> StoreResult<()> {
        self.erase_impl(key, true)
    }

    fn write_impl<K: Encode, V: Encode>(
        &mut self,
        key: &K,
        value: &V,
        sorted: bool,
    ) -> StoreResult<()> {
        let key_bytes = key.encode()?;
        let mut value_bytes = value.encode()?;
        self.obfuscation.apply(&mut value_bytes);
        self.inner.put(&key_bytes, &value_bytes, sorted)
    }

    fn erase_impl<K: Encode>(&mut self, key: &K, sorted: bool) -> StoreResult<()> {
        let key_bytes = key.encode()?;
        self.inner.delete(&key_bytes, sorted)
    }

    /// Discards all staged operations without committing.
    ///
    /// For transaction-backed batches this aborts and restarts the
    /// underlying transaction.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.inner.clear()
    }

    /// Running estimate of the serialized bytes staged so far.
    ///
    /// Callers use this to decide when to flush a long-running batch.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.inner.approximate_size()
    }
}
