//! Backend bindings: the engine-facing byte contract.
//!
//! A backend is one concrete embedded storage engine behind the typed
//! layer. Backends are **opaque ordered byte stores** - obfuscation, key
//! typing and partition-prefix construction all happen above them, except
//! that partition-capable engines own the fallback walk for point reads.
//!
//! # Implementors
//!
//! - [`MemoryBackend`] - in-memory ordered map, used for memory-only stores
//!   and tests; batches stage an operation list and submit it in one step,
//!   the way a log-structured engine's write-batch works
//! - [`RedbBackend`] - copy-on-write B+Tree engine (redb) with MVCC
//!   readers; batches own a write transaction opened on first use, and this
//!   backend carries the partitioned key space extension
//!
//! A log-structured SSTable engine or a classic single-writer B+Tree engine
//! would slot in as further implementors of the same three traits.

mod memory;
mod redb;

pub use self::redb::RedbBackend;
pub use memory::MemoryBackend;

use crate::error::StoreResult;

/// A concrete storage engine.
///
/// All operations work on serialized key bytes. Implementations must be
/// safe to share across threads; write exclusivity is the engine's own
/// concern (see [`BackendBatch`]).
pub trait KvBackend: Send + Sync {
    /// Point lookup of `key`.
    ///
    /// `partitioned` requests the generation-fallback walk on engines that
    /// support it; engines without partitioning ignore the flag. Tombstones
    /// read as absent.
    ///
    /// # Errors
    ///
    /// Returns an error only for native read failures; absence is
    /// `Ok(None)`.
    fn read(&self, key: &[u8], partitioned: bool) -> StoreResult<Option<Vec<u8>>>;

    /// Returns true if `key` is present (and not a tombstone).
    fn exists(&self, key: &[u8], partitioned: bool) -> StoreResult<bool> {
        Ok(self.read(key, partitioned)?.is_some())
    }

    /// Estimates the on-disk size of the key range `[begin, end)`.
    ///
    /// Engines that cannot compute this cheaply return 0, which is a valid
    /// but uninformative answer. An empty or inverted range estimates 0.
    fn estimate_size(&self, begin: &[u8], end: &[u8]) -> StoreResult<u64>;

    /// Estimates the engine's current memory usage in bytes (0 if unknown).
    fn dynamic_memory_usage(&self) -> usize;

    /// Creates a new empty batch scoped to this backend.
    ///
    /// Transaction-based engines open a write transaction on the first
    /// staged operation; only one batch should be mutating at a time,
    /// enforced by the engine's native locking.
    fn create_batch(&self) -> StoreResult<Box<dyn BackendBatch>>;

    /// Creates a cursor over a point-in-time view of the store.
    fn new_cursor(&self) -> StoreResult<Box<dyn BackendCursor>>;

    /// Returns true if the store contains no caller-visible entries.
    ///
    /// Reserved bookkeeping entries (obfuscation key, partition metadata)
    /// are not counted.
    fn is_empty(&self) -> StoreResult<bool>;
}

/// Staged mutations scoped to one backend.
///
/// Operations are invisible to readers until [`commit`](Self::commit);
/// dropping an uncommitted batch leaves the store unchanged.
pub trait BackendBatch: Send {
    /// Stages a write. `sorted` routes the key through the partition prefix
    /// on partition-capable engines.
    fn put(&mut self, key: &[u8], value: &[u8], sorted: bool) -> StoreResult<()>;

    /// Stages a deletion. On partition-capable engines a `sorted` deletion
    /// records an explicit tombstone instead of removing the entry.
    fn delete(&mut self, key: &[u8], sorted: bool) -> StoreResult<()>;

    /// Discards all staged operations without committing.
    fn clear(&mut self) -> StoreResult<()>;

    /// Running estimate of the serialized bytes staged so far.
    fn approximate_size(&self) -> usize;

    /// Atomically applies every staged operation.
    ///
    /// Either all operations become visible or none do. If `sync`, the call
    /// does not return until the engine's durability guarantee completes.
    /// After a successful commit the batch is empty and reusable.
    ///
    /// # Errors
    ///
    /// A commit failure is fatal and never retried internally.
    fn commit(&mut self, sync: bool) -> StoreResult<()>;
}

/// Ordered cursor bound to a point-in-time view of the store.
///
/// Once positioned invalid the cursor stays invalid until re-seeked. The
/// cursor never observes writes committed after its creation.
pub trait BackendCursor {
    /// Positions at the first entry with key >= `key`.
    fn seek(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Positions at the lowest key in the store.
    fn seek_to_first(&mut self) -> StoreResult<()>;

    /// Returns true if the cursor currently references an entry.
    fn valid(&self) -> bool;

    /// Advances one entry forward. Calling this on an invalid cursor is a
    /// no-op; callers should guard with [`valid`](Self::valid).
    fn next(&mut self) -> StoreResult<()>;

    /// Raw key bytes of the current entry.
    fn key(&self) -> Option<&[u8]>;

    /// Raw (still obfuscated) value bytes of the current entry.
    fn value(&self) -> Option<&[u8]>;
}
