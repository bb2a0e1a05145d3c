//! In-memory storage backend.

use crate::backend::{BackendBatch, BackendCursor, KvBackend};
use crate::error::StoreResult;
use crate::partition::is_reserved_key;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory ordered key-value backend.
///
/// Used for memory-only stores and tests. Batches stage an operation list
/// and apply it under a single write lock, the way a log-structured
/// engine's write-batch submission works. Partitioning is not supported;
/// sorted operations behave like plain ones.
///
/// # Thread Safety
///
/// All access is serialized through an internal `RwLock`; readers never
/// observe a partially applied batch.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<Map>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn read(&self, key: &[u8], _partitioned: bool) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn estimate_size(&self, begin: &[u8], end: &[u8]) -> StoreResult<u64> {
        // An empty or inverted range covers nothing.
        if begin >= end {
            return Ok(0);
        }
        let data = self.data.read();
        let total = data
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        Ok(total)
    }

    fn dynamic_memory_usage(&self) -> usize {
        self.data
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    fn create_batch(&self) -> StoreResult<Box<dyn BackendBatch>> {
        Ok(Box::new(MemoryBatch {
            data: Arc::clone(&self.data),
            ops: Vec::new(),
            size_estimate: 0,
        }))
    }

    fn new_cursor(&self) -> StoreResult<Box<dyn BackendCursor>> {
        Ok(Box::new(MemoryCursor {
            snapshot: self.data.read().clone(),
            current: None,
        }))
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self
            .data
            .read()
            .keys()
            .all(|key| is_reserved_key(key)))
    }
}

enum MemOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Staged operation list applied atomically on commit.
struct MemoryBatch {
    data: Arc<RwLock<Map>>,
    ops: Vec<MemOp>,
    size_estimate: usize,
}

impl BackendBatch for MemoryBatch {
    fn put(&mut self, key: &[u8], value: &[u8], _sorted: bool) -> StoreResult<()> {
        // Same write-ahead encoding estimate the log engines use: header
        // byte, varint lengths (assumed < 16 KiB), then the payloads.
        self.size_estimate +=
            3 + usize::from(key.len() > 127) + key.len() + usize::from(value.len() > 127) + value.len();
        self.ops.push(MemOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn delete(&mut self, key: &[u8], _sorted: bool) -> StoreResult<()> {
        self.size_estimate += 2 + usize::from(key.len() > 127) + key.len();
        self.ops.push(MemOp::Delete { key: key.to_vec() });
        Ok(())
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.ops.clear();
        self.size_estimate = 0;
        Ok(())
    }

    fn approximate_size(&self) -> usize {
        self.size_estimate
    }

    fn commit(&mut self, _sync: bool) -> StoreResult<()> {
        let mut data = self.data.write();
        for op in self.ops.drain(..) {
            match op {
                MemOp::Put { key, value } => {
                    data.insert(key, value);
                }
                MemOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        self.size_estimate = 0;
        Ok(())
    }
}

/// Cursor over a snapshot taken at creation time.
struct MemoryCursor {
    snapshot: Map,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl BackendCursor for MemoryCursor {
    fn seek(&mut self, key: &[u8]) -> StoreResult<()> {
        self.current = self
            .snapshot
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(())
    }

    fn seek_to_first(&mut self) -> StoreResult<()> {
        self.current = self
            .snapshot
            .first_key_value()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> StoreResult<()> {
        let Some(cur) = self.current.as_ref().map(|(k, _)| k.clone()) else {
            return Ok(());
        };
        self.current = self
            .snapshot
            .range::<[u8], _>((Bound::Excluded(cur.as_slice()), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(())
    }

    fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_is_none() {
        let backend = MemoryBackend::new();
        assert!(backend.read(b"nope", false).unwrap().is_none());
    }

    #[test]
    fn batch_commit_applies_all_ops() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        batch.put(b"b", b"2", false).unwrap();
        batch.delete(b"a", false).unwrap();
        batch.commit(false).unwrap();

        assert!(backend.read(b"a", false).unwrap().is_none());
        assert_eq!(backend.read(b"b", false).unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn uncommitted_batch_is_invisible() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        assert!(backend.read(b"a", false).unwrap().is_none());
        drop(batch);
        assert!(backend.read(b"a", false).unwrap().is_none());
    }

    #[test]
    fn clear_discards_staged_ops() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        assert!(batch.approximate_size() > 0);
        batch.clear().unwrap();
        assert_eq!(batch.approximate_size(), 0);
        batch.commit(false).unwrap();
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn batch_is_reusable_after_commit() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        batch.commit(false).unwrap();
        assert_eq!(batch.approximate_size(), 0);

        batch.put(b"b", b"2", false).unwrap();
        batch.commit(false).unwrap();
        assert_eq!(backend.read(b"b", false).unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn size_estimate_formula() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"ab", b"cde", false).unwrap();
        // 3 + 2 + 3, both payloads under 128 bytes
        assert_eq!(batch.approximate_size(), 8);
        batch.delete(b"ab", false).unwrap();
        assert_eq!(batch.approximate_size(), 8 + 4);
    }

    #[test]
    fn cursor_iterates_in_order() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"c", b"3", false).unwrap();
        batch.put(b"a", b"1", false).unwrap();
        batch.put(b"b", b"2", false).unwrap();
        batch.commit(false).unwrap();

        let mut cursor = backend.new_cursor().unwrap();
        cursor.seek_to_first().unwrap();
        let mut keys = Vec::new();
        while cursor.valid() {
            keys.push(cursor.key().unwrap().to_vec());
            cursor.next().unwrap();
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn cursor_seek_lower_bound() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        batch.put(b"c", b"3", false).unwrap();
        batch.commit(false).unwrap();

        let mut cursor = backend.new_cursor().unwrap();
        cursor.seek(b"b").unwrap();
        assert!(cursor.valid());
        assert_eq!(cursor.key().unwrap(), b"c");

        cursor.seek(b"d").unwrap();
        assert!(!cursor.valid());
        // stays invalid until re-seeked
        cursor.next().unwrap();
        assert!(!cursor.valid());
    }

    #[test]
    fn cursor_is_snapshot_isolated() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        batch.commit(false).unwrap();

        let mut cursor = backend.new_cursor().unwrap();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"b", b"2", false).unwrap();
        batch.commit(false).unwrap();

        cursor.seek_to_first().unwrap();
        cursor.next().unwrap();
        assert!(!cursor.valid());
    }

    #[test]
    fn estimate_size_sums_range() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"11", false).unwrap();
        batch.put(b"b", b"22", false).unwrap();
        batch.put(b"z", b"33", false).unwrap();
        batch.commit(false).unwrap();

        // "a" and "b" fall in ["a", "c"); "z" does not
        assert_eq!(backend.estimate_size(b"a", b"c").unwrap(), 6);
    }

    #[test]
    fn estimate_size_empty_or_inverted_range_is_zero() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch.put(b"a", b"1", false).unwrap();
        batch.commit(false).unwrap();

        assert_eq!(backend.estimate_size(b"z", b"a").unwrap(), 0);
        assert_eq!(backend.estimate_size(b"a", b"a").unwrap(), 0);
    }

    #[test]
    fn is_empty_ignores_reserved_keys() {
        let backend = MemoryBackend::new();
        let mut batch = backend.create_batch().unwrap();
        batch
            .put(crate::obfuscate::OBFUSCATION_KEY_KEY, b"12345678", false)
            .unwrap();
        batch.commit(false).unwrap();
        assert!(backend.is_empty().unwrap());

        let mut batch = backend.create_batch().unwrap();
        batch.put(b"user", b"data", false).unwrap();
        batch.commit(false).unwrap();
        assert!(!backend.is_empty().unwrap());
    }
}
