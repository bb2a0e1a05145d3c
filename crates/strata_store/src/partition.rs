//! Partitioned key space support.
//!
//! Backends that support partitioning tag every sorted key with a 16-bit
//! generation prefix. Point reads fall back through older generations until
//! a value or an explicit tombstone is found, which lets append-mostly
//! workloads retire old generations without rewriting live keys.
//!
//! Partition `0x0000` is reserved for non-partitioned bookkeeping (the
//! obfuscation key, the current-partition counter) and is never a candidate
//! for fallback lookup. The partition index only ever increases.

use crate::obfuscate::OBFUSCATION_KEY_KEY;

/// Reserved metadata partition index.
pub const META_PARTITION: u16 = 0x0000;

/// Reserved key holding the persisted current-partition counter.
///
/// Lives in the metadata partition; the value is the raw big-endian index.
pub(crate) const PARTITION_INDEX_KEY: &[u8] =
    &[0x00, 0x00, b'p', b'a', b'r', b't', b'i', b't', b'i', b'o', b'n'];

/// Explicit deletion marker stored at a partition-prefixed key.
///
/// Distinct from absence: finding a tombstone stops the fallback walk. A
/// stored value bit-identical to the tombstone is indistinguishable from a
/// deletion; callers own the key space and must not store such values under
/// sorted keys.
pub(crate) const TOMBSTONE: &[u8] = &[0x00];

/// Prefixes `key` with the big-endian partition index.
///
/// Big-endian so that prefixed keys sort by generation first, then by key.
pub(crate) fn partitioned_key(partition: u16, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + key.len());
    out.extend_from_slice(&partition.to_be_bytes());
    out.extend_from_slice(key);
    out
}

/// Returns true for keys belonging to the reserved bookkeeping namespace.
///
/// Covers the obfuscation key entry and everything in the metadata
/// partition. Caller-chosen keys must never collide with this namespace.
pub(crate) fn is_reserved_key(key: &[u8]) -> bool {
    key == OBFUSCATION_KEY_KEY
        || (key.len() >= 2 && key[..2] == META_PARTITION.to_be_bytes())
}
