//! # StrataKV Store
//!
//! A pluggable, ordered key-value storage layer sitting between
//! application state (chainstate, block index, wallet metadata) and an
//! interchangeable embedded storage engine.
//!
//! The layer provides:
//!
//! - A uniform typed read/write/iterate/batch interface independent of the
//!   underlying engine
//! - Transparent XOR obfuscation of values at rest
//! - An optional partitioned key space where generations of sorted keys
//!   coexist and point reads fall back most-recent-first
//! - Atomic batched mutation with per-commit durability control
//!
//! ## Backends
//!
//! - [`MemoryBackend`] - in-memory ordered map for memory-only stores and
//!   tests
//! - [`RedbBackend`] - copy-on-write B+Tree engine (redb) with MVCC
//!   readers and partition support
//!
//! ## Example
//!
//! ```no_run
//! use strata_store::{Store, StoreParams};
//!
//! let store = Store::open(
//!     StoreParams::new("/var/lib/node/chainstate").obfuscate(true),
//! ).unwrap();
//!
//! let mut batch = store.create_batch().unwrap();
//! batch.write(&"tip".to_string(), &100u64).unwrap();
//! store.write_batch(&mut batch, true).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod config;
mod error;
mod iter;
mod obfuscate;
mod partition;
mod store;

pub use backend::{BackendBatch, BackendCursor, KvBackend, MemoryBackend, RedbBackend};
pub use batch::Batch;
pub use config::{StoreOptions, StoreParams, DEFAULT_CACHE_BYTES};
pub use error::{StoreError, StoreResult};
pub use iter::Iter;
pub use obfuscate::{Obfuscation, OBFUSCATION_KEY_LEN};
pub use partition::META_PARTITION;
pub use store::Store;
