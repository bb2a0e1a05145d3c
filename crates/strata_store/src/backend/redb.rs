//! Copy-on-write B+Tree backend (redb).
//!
//! redb is an MVCC engine: a single writer runs alongside any number of
//! snapshot readers. A [`RedbBatch`] literally *is* a write transaction,
//! opened lazily on the first staged operation and released by commit so
//! that batches can be created and committed back to back without
//! contending for the write lock. This backend also carries the partitioned
//! key
//! space extension (see [`crate::partition`]): sorted operations are
//! prefixed with the current partition index, sorted deletions record
//! tombstones, and partitioned point reads fall back through older
//! partitions.

use crate::backend::{BackendBatch, BackendCursor, KvBackend};
use crate::config::StoreParams;
use crate::error::{StoreError, StoreResult};
use crate::partition::{
    is_reserved_key, partitioned_key, META_PARTITION, PARTITION_INDEX_KEY, TOMBSTONE,
};
use redb::{Builder, Database, Durability, ReadableTable, TableDefinition, WriteTransaction};
use std::ops::Bound;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("strata");

/// Name of the engine file inside the store directory.
pub const STORE_FILE: &str = "strata.redb";

/// Engine state shared between the backend, its batches and its cursors.
struct RedbInner {
    db: Database,
    /// Monotonic mirror of the persisted partition index, for diagnostics.
    /// The authoritative value is the stored entry, read under each
    /// transaction.
    partition: AtomicU16,
}

/// Parses a persisted partition index entry.
fn decode_partition_index(raw: &[u8]) -> Option<u16> {
    match raw {
        [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Copy-on-write B+Tree backend with partitioned key space support.
pub struct RedbBackend {
    inner: Arc<RedbInner>,
}

impl RedbBackend {
    /// Opens or creates the engine inside `params.path`.
    ///
    /// The directory must already exist. Compacts the store first when
    /// `force_compact` is set, then makes sure the table exists and loads
    /// or initializes the persisted partition index.
    ///
    /// # Errors
    ///
    /// Any native failure to open or create maps to [`StoreError::Open`].
    pub fn open(params: &StoreParams) -> StoreResult<Self> {
        let file = params.path.join(STORE_FILE);
        let mut db = Builder::new()
            .set_cache_size(params.cache_bytes)
            .create(&file)
            .map_err(|e| StoreError::open(e.to_string()))?;

        if params.options.force_compact {
            info!(path = %file.display(), "compacting store");
            db.compact().map_err(|e| StoreError::open(e.to_string()))?;
        }

        // Make sure the table exists so read transactions can open it.
        let txn = db
            .begin_write()
            .map_err(|e| StoreError::open(e.to_string()))?;
        {
            txn.open_table(TABLE)
                .map_err(|e| StoreError::open(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::open(e.to_string()))?;

        let backend = Self {
            inner: Arc::new(RedbInner {
                db,
                partition: AtomicU16::new(META_PARTITION),
            }),
        };
        backend.load_partition_index()?;
        Ok(backend)
    }

    /// Loads the persisted partition index, writing the initial value on a
    /// fresh store.
    fn load_partition_index(&self) -> StoreResult<()> {
        match self.get_raw(PARTITION_INDEX_KEY)? {
            Some(raw) => {
                let index = decode_partition_index(&raw).ok_or_else(|| {
                    StoreError::open("malformed partition index entry".to_string())
                })?;
                debug!(partition = index, "using existing partition index");
                self.inner.partition.store(index, Ordering::SeqCst);
            }
            None => {
                let index = 1u16;
                info!(partition = index, "initializing partition index");
                let txn = self
                    .inner
                    .db
                    .begin_write()
                    .map_err(|e| StoreError::open(e.to_string()))?;
                {
                    let mut table = txn
                        .open_table(TABLE)
                        .map_err(|e| StoreError::open(e.to_string()))?;
                    table
                        .insert(PARTITION_INDEX_KEY, index.to_be_bytes().as_slice())
                        .map_err(|e| StoreError::open(e.to_string()))?;
                }
                txn.commit().map_err(|e| StoreError::open(e.to_string()))?;
                self.inner.partition.store(index, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Current partition index (test and diagnostics hook).
    #[must_use]
    pub fn partition_index(&self) -> u16 {
        self.inner.partition.load(Ordering::SeqCst)
    }

    /// Raw point lookup without tombstone interpretation.
    fn get_raw(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| StoreError::read(e.to_string()))?;
        let table = txn
            .open_table(TABLE)
            .map_err(|e| StoreError::read(e.to_string()))?;
        let value = table
            .get(key)
            .map_err(|e| StoreError::read(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }
}

impl KvBackend for RedbBackend {
    fn read(&self, key: &[u8], partitioned: bool) -> StoreResult<Option<Vec<u8>>> {
        if !partitioned {
            return Ok(self.get_raw(key)?.filter(|value| value != TOMBSTONE));
        }

        // Walk backwards from the newest complete partition. The current
        // partition is still open for writes and never read. A tombstone
        // stops the walk; partition 0 is metadata and never a candidate.
        let txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| StoreError::read(e.to_string()))?;
        let table = txn
            .open_table(TABLE)
            .map_err(|e| StoreError::read(e.to_string()))?;

        // The index comes from the same snapshot as the walk, never from
        // the shared counter, so the walk always covers every partition
        // this snapshot can see.
        let newest = match table
            .get(PARTITION_INDEX_KEY)
            .map_err(|e| StoreError::read(e.to_string()))?
        {
            Some(guard) => decode_partition_index(guard.value()).ok_or_else(|| {
                StoreError::read("malformed partition index entry".to_string())
            })?,
            None => 1,
        };
        let mut part = newest.saturating_sub(1);
        while part > META_PARTITION {
            let probe = partitioned_key(part, key);
            if let Some(guard) = table
                .get(probe.as_slice())
                .map_err(|e| StoreError::read(e.to_string()))?
            {
                let value = guard.value();
                if value == TOMBSTONE {
                    debug!(partition = part, "fallback read hit tombstone");
                    return Ok(None);
                }
                return Ok(Some(value.to_vec()));
            }
            part -= 1;
        }
        Ok(None)
    }

    fn estimate_size(&self, _begin: &[u8], _end: &[u8]) -> StoreResult<u64> {
        // The engine offers no cheap range-size property; 0 is a valid but
        // uninformative answer.
        Ok(0)
    }

    fn dynamic_memory_usage(&self) -> usize {
        0
    }

    fn create_batch(&self) -> StoreResult<Box<dyn BackendBatch>> {
        Ok(Box::new(RedbBatch::new(Arc::clone(&self.inner))?))
    }

    fn new_cursor(&self) -> StoreResult<Box<dyn BackendCursor>> {
        let txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| StoreError::read(e.to_string()))?;
        let table = txn
            .open_table(TABLE)
            .map_err(|e| StoreError::read(e.to_string()))?;
        Ok(Box::new(RedbCursor {
            table,
            current: None,
        }))
    }

    fn is_empty(&self) -> StoreResult<bool> {
        let txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| StoreError::read(e.to_string()))?;
        let table = txn
            .open_table(TABLE)
            .map_err(|e| StoreError::read(e.to_string()))?;
        for entry in table.iter().map_err(|e| StoreError::read(e.to_string()))? {
            let (key, _) = entry.map_err(|e| StoreError::read(e.to_string()))?;
            if !is_reserved_key(key.value()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A write transaction staged as a batch.
///
/// The transaction is opened on the first staged operation and taken by
/// commit, so an idle or freshly committed batch does not hold the engine's
/// write lock.
struct RedbBatch {
    inner: Arc<RedbInner>,
    /// None while no operations are staged.
    txn: Option<WriteTransaction>,
    /// Partition index for this batch's sorted operations, read from the
    /// persisted entry under the batch's own transaction.
    partition: Option<u16>,
    size_estimate: usize,
    sorted_used: bool,
}

impl RedbBatch {
    fn new(inner: Arc<RedbInner>) -> StoreResult<Self> {
        Ok(Self {
            inner,
            txn: None,
            partition: None,
            size_estimate: 0,
            sorted_used: false,
        })
    }

    fn txn_mut(&mut self) -> StoreResult<&WriteTransaction> {
        if self.txn.is_none() {
            let txn = self
                .inner
                .db
                .begin_write()
                .map_err(|e| StoreError::write(e.to_string()))?;
            self.txn = Some(txn);
        }
        self.txn
            .as_ref()
            .ok_or_else(|| StoreError::write("write transaction unavailable".to_string()))
    }

    /// The partition this batch's sorted keys are prefixed with.
    ///
    /// Loaded from the persisted entry while holding the write lock, so a
    /// concurrent committer cannot slip an increment in between the load
    /// and this batch's own writes.
    fn current_partition(&mut self) -> StoreResult<u16> {
        if let Some(part) = self.partition {
            return Ok(part);
        }
        let part = {
            let txn = self.txn_mut()?;
            let table = txn
                .open_table(TABLE)
                .map_err(|e| StoreError::write(e.to_string()))?;
            let part = match table
                .get(PARTITION_INDEX_KEY)
                .map_err(|e| StoreError::write(e.to_string()))?
            {
                Some(guard) => decode_partition_index(guard.value()).ok_or_else(|| {
                    StoreError::write("malformed partition index entry".to_string())
                })?,
                None => 1,
            };
            part
        };
        self.partition = Some(part);
        Ok(part)
    }
}

impl BackendBatch for RedbBatch {
    fn put(&mut self, key: &[u8], value: &[u8], sorted: bool) -> StoreResult<()> {
        let prefixed;
        let stored_key: &[u8] = if sorted {
            self.sorted_used = true;
            prefixed = partitioned_key(self.current_partition()?, key);
            &prefixed
        } else {
            key
        };
        {
            let txn = self.txn_mut()?;
            let mut table = txn
                .open_table(TABLE)
                .map_err(|e| StoreError::write(e.to_string()))?;
            table
                .insert(stored_key, value)
                .map_err(|e| StoreError::write(e.to_string()))?;
        }
        self.size_estimate += 3
            + usize::from(stored_key.len() > 127)
            + stored_key.len()
            + usize::from(value.len() > 127)
            + value.len();
        Ok(())
    }

    fn delete(&mut self, key: &[u8], sorted: bool) -> StoreResult<()> {
        if sorted {
            // Record an explicit tombstone so fallback reads stop here
            // instead of surfacing a value from an older partition.
            self.sorted_used = true;
            let stored_key = partitioned_key(self.current_partition()?, key);
            {
                let txn = self.txn_mut()?;
                let mut table = txn
                    .open_table(TABLE)
                    .map_err(|e| StoreError::write(e.to_string()))?;
                table
                    .insert(stored_key.as_slice(), TOMBSTONE)
                    .map_err(|e| StoreError::write(e.to_string()))?;
            }
            self.size_estimate += 3 + usize::from(key.len() > 127) + key.len() + TOMBSTONE.len();
        } else {
            {
                let txn = self.txn_mut()?;
                let mut table = txn
                    .open_table(TABLE)
                    .map_err(|e| StoreError::write(e.to_string()))?;
                table
                    .remove(key)
                    .map_err(|e| StoreError::write(e.to_string()))?;
            }
            self.size_estimate += 2 + usize::from(key.len() > 127) + key.len();
        }
        Ok(())
    }

    fn clear(&mut self) -> StoreResult<()> {
        if let Some(txn) = self.txn.take() {
            txn.abort().map_err(|e| StoreError::write(e.to_string()))?;
        }
        self.partition = None;
        self.size_estimate = 0;
        self.sorted_used = false;
        Ok(())
    }

    fn approximate_size(&self) -> usize {
        self.size_estimate
    }

    fn commit(&mut self, sync: bool) -> StoreResult<()> {
        // An empty batch has no transaction and nothing to make durable.
        let Some(mut txn) = self.txn.take() else {
            self.partition = None;
            self.sorted_used = false;
            self.size_estimate = 0;
            return Ok(());
        };

        let rolled = if self.sorted_used {
            // Persist the rolled-over index in the same transaction so the
            // increment is atomic with the writes that triggered it. The
            // base value was read under this same transaction, so two
            // committers can never persist the same or a lower index.
            let part = self.partition.ok_or_else(|| {
                StoreError::write("sorted operation staged without a partition".to_string())
            })?;
            let next = part
                .checked_add(1)
                .ok_or_else(|| StoreError::write("partition index overflow".to_string()))?;
            let mut table = txn
                .open_table(TABLE)
                .map_err(|e| StoreError::write(e.to_string()))?;
            table
                .insert(PARTITION_INDEX_KEY, next.to_be_bytes().as_slice())
                .map_err(|e| StoreError::write(e.to_string()))?;
            drop(table);
            Some(next)
        } else {
            None
        };

        txn.set_durability(if sync {
            Durability::Immediate
        } else {
            Durability::Eventual
        });
        txn.commit().map_err(|e| StoreError::write(e.to_string()))?;

        if let Some(next) = rolled {
            // fetch_max keeps the mirror monotonic even if another
            // committer's update lands in between.
            self.inner.partition.fetch_max(next, Ordering::SeqCst);
            debug!(partition = next, "partition index advanced");
        }
        self.partition = None;
        self.sorted_used = false;
        self.size_estimate = 0;
        Ok(())
    }
}

/// Cursor bound to a read snapshot taken at creation time.
///
/// Steps by re-seeking past the current key, which keeps the cursor free of
/// self-referential borrows into the snapshot table.
struct RedbCursor {
    table: redb::ReadOnlyTable<&'static [u8], &'static [u8]>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl RedbCursor {
    fn load_first_at_least(&self, bound: Bound<&[u8]>) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let mut range = self
            .table
            .range::<&[u8]>((bound, Bound::Unbounded))
            .map_err(|e| StoreError::read(e.to_string()))?;
        match range.next() {
            Some(entry) => {
                let (key, value) = entry.map_err(|e| StoreError::read(e.to_string()))?;
                Ok(Some((key.value().to_vec(), value.value().to_vec())))
            }
            None => Ok(None),
        }
    }
}

impl BackendCursor for RedbCursor {
    fn seek(&mut self, key: &[u8]) -> StoreResult<()> {
        self.current = self.load_first_at_least(Bound::Included(key))?;
        Ok(())
    }

    fn seek_to_first(&mut self) -> StoreResult<()> {
        self.current = match self
            .table
            .first()
            .map_err(|e| StoreError::read(e.to_string()))?
        {
            Some((key, value)) => Some((key.value().to_vec(), value.value().to_vec())),
            None => None,
        };
        Ok(())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> StoreResult<()> {
        let Some(cur) = self.current.as_ref().map(|(k, _)| k.clone()) else {
            return Ok(());
        };
        self.current = self.load_first_at_least(Bound::Excluded(cur.as_slice()))?;
        Ok(())
    }

    fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }
}
