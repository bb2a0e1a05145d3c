//! The storage handle: typed access over one backend.

use crate::backend::{KvBackend, MemoryBackend, RedbBackend};
use crate::batch::Batch;
use crate::config::StoreParams;
use crate::error::{StoreError, StoreResult};
use crate::iter::Iter;
use crate::obfuscate::{Obfuscation, OBFUSCATION_KEY_KEY};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use strata_codec::{Decode, Encode};
use tracing::{debug, info};

/// A typed handle over one embedded storage engine.
///
/// A `Store` owns exactly one backend environment, created at open time and
/// released on drop. All reads de-obfuscate and decode values; all writes
/// go through [`Batch`]es, which serialize and obfuscate up front.
///
/// # Concurrency
///
/// `Store` is `Send + Sync`. Reads and iterators may run concurrently from
/// any thread; write exclusivity is enforced by the engine itself (a second
/// concurrent batch on a single-writer engine blocks until the first
/// commits or is dropped). No operation is cancellable once issued.
///
/// # Example
///
/// ```
/// use strata_store::{Store, StoreParams};
///
/// let store = Store::open(StoreParams::in_memory()).unwrap();
/// store.write(&"height".to_string(), &42u64, false).unwrap();
/// assert_eq!(store.read::<String, u64>(&"height".to_string()).unwrap(), Some(42));
/// ```
pub struct Store {
    name: String,
    backend: Arc<dyn KvBackend>,
    obfuscation: Obfuscation,
}

impl Store {
    /// Opens or creates a store described by `params`.
    ///
    /// If `wipe_data` is set, any existing store at `params.path` is
    /// destroyed first. Parent directories are created as needed. If
    /// `obfuscate` is requested on an empty store with no stored key, a
    /// fresh random obfuscation key is generated and persisted before any
    /// other write; a non-empty store without a key keeps obfuscation
    /// disabled so pre-existing plaintext data stays readable.
    ///
    /// # Errors
    ///
    /// Native open failures map to [`StoreError::Open`]; filesystem
    /// manipulation failures to [`StoreError::Io`].
    pub fn open(params: StoreParams) -> StoreResult<Self> {
        let (name, backend): (String, Arc<dyn KvBackend>) = if params.memory_only {
            ("memory".to_string(), Arc::new(MemoryBackend::new()))
        } else {
            if params.path.as_os_str().is_empty() {
                return Err(StoreError::config("file-backed store requires a path"));
            }
            if params.wipe_data {
                info!(path = %params.path.display(), "wiping store");
                Self::destroy(&params.path)?;
            }
            fs::create_dir_all(&params.path)?;
            info!(path = %params.path.display(), "opening store");
            let name = params
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            (name, Arc::new(RedbBackend::open(&params)?))
        };

        let mut store = Self {
            name,
            backend,
            obfuscation: Obfuscation::disabled(),
        };
        store.init_obfuscation(&params)?;
        info!(db = %store.name, key = %store.obfuscation, "using obfuscation key");
        Ok(store)
    }

    /// Destroys the store directory at `path`, recursively and
    /// irreversibly. A missing directory is not an error.
    pub fn destroy(path: &Path) -> StoreResult<()> {
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    /// Loads the stored obfuscation key, or generates and persists one.
    ///
    /// The key entry itself bypasses obfuscation in both directions: it is
    /// read and written raw, since it bootstraps decoding of everything
    /// else.
    fn init_obfuscation(&mut self, params: &StoreParams) -> StoreResult<()> {
        if let Some(raw) = self.backend.read(OBFUSCATION_KEY_KEY, false)? {
            self.obfuscation = Obfuscation::from_slice(&raw)?;
            return Ok(());
        }
        if params.obfuscate && self.backend.is_empty()? {
            let obfuscation = Obfuscation::random();
            let mut batch = self.backend.create_batch()?;
            batch.put(OBFUSCATION_KEY_KEY, obfuscation.key_bytes(), false)?;
            batch.commit(false)?;
            info!(db = %self.name, key = %obfuscation, "wrote new obfuscation key");
            self.obfuscation = obfuscation;
        }
        Ok(())
    }

    /// Reads and decodes the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent, and also when the stored
    /// bytes fail to decode as `V` - a corrupt record degrades to "not
    /// found" rather than failing a broad scan.
    ///
    /// # Errors
    ///
    /// Only native read failures are errors.
    pub fn read<K: Encode, V: Decode>(&self, key: &K) -> StoreResult<Option<V>> {
        self.read_impl(key, false)
    }

    /// Like [`read`](Self::read), but looks the key up through the
    /// partition-fallback walk on partition-capable engines.
    pub fn read_sorted<K: Encode, V: Decode>(&self, key: &K) -> StoreResult<Option<V>> {
        self.read_impl(key, true)
    }

    fn read_impl<K: Encode, V: Decode>(
        &self,
        key: &K,
        partitioned: bool,
    ) -> StoreResult<Option<V>> {
        let key_bytes = key.encode()?;
        let Some(mut raw) = self.backend.read(&key_bytes, partitioned)? else {
            return Ok(None);
        };
        self.obfuscation.apply(&mut raw);
        match V::decode(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                debug!(db = %self.name, %error, "discarding undecodable stored value");
                Ok(None)
            }
        }
    }

    /// Returns true if `key` is present, without decoding the value.
    pub fn exists<K: Encode>(&self, key: &K) -> StoreResult<bool> {
        let key_bytes = key.encode()?;
        self.backend.exists(&key_bytes, false)
    }

    /// Like [`exists`](Self::exists), through the partition-fallback walk.
    pub fn exists_sorted<K: Encode>(&self, key: &K) -> StoreResult<bool> {
        let key_bytes = key.encode()?;
        self.backend.exists(&key_bytes, true)
    }

    /// Writes a single key-value pair as a one-operation batch.
    ///
    /// If `sync`, the write is forced to stable storage before returning.
    /// Callers on a crash-critical path must request sync.
    pub fn write<K: Encode, V: Encode>(&self, key: &K, value: &V, sync: bool) -> StoreResult<()> {
        let mut batch = self.create_batch()?;
        batch.write(key, value)?;
        self.write_batch(&mut batch, sync)
    }

    /// Erases a single key as a one-operation batch.
    pub fn erase<K: Encode>(&self, key: &K, sync: bool) -> StoreResult<()> {
        let mut batch = self.create_batch()?;
        batch.erase(key)?;
        self.write_batch(&mut batch, sync)
    }

    /// Creates a new empty batch scoped to this store.
    pub fn create_batch(&self) -> StoreResult<Batch> {
        Ok(Batch::new(self.backend.create_batch()?, self.obfuscation))
    }

    /// Atomically commits every operation staged in `batch`.
    ///
    /// Either all operations become visible or none do. If `sync`, the
    /// call blocks until the engine's durability guarantee completes.
    /// After a successful commit the batch is empty and reusable.
    ///
    /// # Errors
    ///
    /// A commit failure is [`StoreError::Write`], surfaced without any
    /// internal retry: a failed commit means local storage can no longer
    /// be trusted.
    pub fn write_batch(&self, batch: &mut Batch, sync: bool) -> StoreResult<()> {
        batch.inner.commit(sync)?;
        debug!(db = %self.name, sync, "committed batch");
        Ok(())
    }

    /// Creates an iterator over a point-in-time view of the store.
    pub fn iter(&self) -> StoreResult<Iter> {
        Ok(Iter::new(self.backend.new_cursor()?, self.obfuscation))
    }

    /// Returns true if the store contains no caller-visible entries.
    ///
    /// Reserved bookkeeping entries do not count.
    pub fn is_empty(&self) -> StoreResult<bool> {
        self.backend.is_empty()
    }

    /// Estimates the on-disk size of the key range `[begin, end)`.
    ///
    /// May be 0 on engines that cannot compute this cheaply; treat it as a
    /// lower bound, not a precise answer.
    pub fn estimate_size<K: Encode>(&self, begin: &K, end: &K) -> StoreResult<u64> {
        let begin_bytes = begin.encode()?;
        let end_bytes = end.encode()?;
        self.backend.estimate_size(&begin_bytes, &end_bytes)
    }

    /// Estimates the engine's current memory usage in bytes (0 if the
    /// engine cannot report it).
    #[must_use]
    pub fn dynamic_memory_usage(&self) -> usize {
        self.backend.dynamic_memory_usage()
    }

    /// The obfuscation currently in effect for this store.
    #[must_use]
    pub fn obfuscation(&self) -> &Obfuscation {
        &self.obfuscation
    }

    /// The store's name, derived from its directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
