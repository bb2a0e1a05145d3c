//! Store construction parameters.

use std::path::PathBuf;

/// Default cache budget for a newly opened store.
pub const DEFAULT_CACHE_BYTES: usize = 8 * 1024 * 1024;

/// Engine-specific performance and debug options.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Compact the store on startup.
    pub force_compact: bool,
}

/// Parameters for opening a store.
#[derive(Debug, Clone)]
pub struct StoreParams {
    /// Filesystem location of the store directory. Ignored for
    /// memory-only stores.
    pub path: PathBuf,

    /// Cache budget in bytes for the native engine.
    pub cache_bytes: usize,

    /// If true, bypass the filesystem entirely and keep all data in memory.
    pub memory_only: bool,

    /// If true, destroy any existing data at `path` before opening.
    pub wipe_data: bool,

    /// If true, store values obfuscated via XOR. If false, values are
    /// XOR'd with an all-zero key, which is the identity.
    pub obfuscate: bool,

    /// Passed-through engine options.
    pub options: StoreOptions,
}

impl Default for StoreParams {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            cache_bytes: DEFAULT_CACHE_BYTES,
            memory_only: false,
            wipe_data: false,
            obfuscate: false,
            options: StoreOptions::default(),
        }
    }
}

impl StoreParams {
    /// Creates parameters for a file-backed store at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Creates parameters for a memory-only store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            memory_only: true,
            ..Self::default()
        }
    }

    /// Sets the cache budget in bytes.
    #[must_use]
    pub const fn cache_bytes(mut self, bytes: usize) -> Self {
        self.cache_bytes = bytes;
        self
    }

    /// Sets whether existing data is wiped before opening.
    #[must_use]
    pub const fn wipe_data(mut self, value: bool) -> Self {
        self.wipe_data = value;
        self
    }

    /// Sets whether values are obfuscated at rest.
    #[must_use]
    pub const fn obfuscate(mut self, value: bool) -> Self {
        self.obfuscate = value;
        self
    }

    /// Sets whether the store is compacted on startup.
    #[must_use]
    pub const fn force_compact(mut self, value: bool) -> Self {
        self.options.force_compact = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = StoreParams::default();
        assert_eq!(params.cache_bytes, DEFAULT_CACHE_BYTES);
        assert!(!params.memory_only);
        assert!(!params.wipe_data);
        assert!(!params.obfuscate);
        assert!(!params.options.force_compact);
    }

    #[test]
    fn builder_pattern() {
        let params = StoreParams::new("/tmp/db")
            .cache_bytes(1024)
            .wipe_data(true)
            .obfuscate(true)
            .force_compact(true);

        assert_eq!(params.path, PathBuf::from("/tmp/db"));
        assert_eq!(params.cache_bytes, 1024);
        assert!(params.wipe_data);
        assert!(params.obfuscate);
        assert!(params.options.force_compact);
    }

    #[test]
    fn in_memory_params() {
        let params = StoreParams::in_memory();
        assert!(params.memory_only);
        assert!(params.path.as_os_str().is_empty());
    }
}
