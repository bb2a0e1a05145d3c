//! End-to-end tests of the typed storage layer over both backends.

use std::path::Path;
use strata_store::{Store, StoreParams};
use tempfile::tempdir;

fn open_disk(path: &Path) -> Store {
    Store::open(StoreParams::new(path)).unwrap()
}

fn key(s: &str) -> String {
    s.to_string()
}

#[test]
fn write_read_roundtrip_memory() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    store.write(&key("k"), &key("v"), false).unwrap();
    assert_eq!(store.read::<String, String>(&key("k")).unwrap(), Some(key("v")));
}

#[test]
fn write_read_roundtrip_disk() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());
    store.write(&key("k"), &12345u64, false).unwrap();
    assert_eq!(store.read::<String, u64>(&key("k")).unwrap(), Some(12345));
}

#[test]
fn write_read_roundtrip_obfuscated() {
    let dir = tempdir().unwrap();
    let store = Store::open(StoreParams::new(dir.path()).obfuscate(true)).unwrap();
    assert!(store.obfuscation().is_enabled());
    store.write(&key("k"), &key("plain value"), false).unwrap();
    assert_eq!(
        store.read::<String, String>(&key("k")).unwrap(),
        Some(key("plain value"))
    );
}

#[test]
fn read_missing_is_none_not_error() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    assert_eq!(store.read::<String, String>(&key("absent")).unwrap(), None);
    assert!(!store.exists(&key("absent")).unwrap());
}

#[test]
fn erase_removes_even_after_rewrites() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    store.write(&key("k"), &1u64, false).unwrap();
    store.write(&key("k"), &2u64, false).unwrap();
    store.erase(&key("k"), false).unwrap();
    assert!(!store.exists(&key("k")).unwrap());
    assert_eq!(store.read::<String, u64>(&key("k")).unwrap(), None);
}

#[test]
fn batch_commit_is_atomic() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());

    let mut batch = store.create_batch().unwrap();
    batch.write(&key("a"), &1u64).unwrap();
    batch.write(&key("b"), &2u64).unwrap();
    batch.write(&key("c"), &3u64).unwrap();

    // Nothing visible before commit.
    assert!(!store.exists(&key("a")).unwrap());

    store.write_batch(&mut batch, false).unwrap();
    assert_eq!(store.read::<String, u64>(&key("a")).unwrap(), Some(1));
    assert_eq!(store.read::<String, u64>(&key("b")).unwrap(), Some(2));
    assert_eq!(store.read::<String, u64>(&key("c")).unwrap(), Some(3));
}

#[test]
fn dropped_batch_leaves_store_unchanged() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());

    let mut batch = store.create_batch().unwrap();
    batch.write(&key("a"), &1u64).unwrap();
    batch.write(&key("b"), &2u64).unwrap();
    drop(batch);

    assert!(store.is_empty().unwrap());
    assert!(!store.exists(&key("a")).unwrap());
}

#[test]
fn cleared_batch_commits_nothing() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    let mut batch = store.create_batch().unwrap();
    batch.write(&key("a"), &1u64).unwrap();
    batch.clear().unwrap();
    store.write_batch(&mut batch, false).unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn batch_approximate_size_grows() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    let mut batch = store.create_batch().unwrap();
    assert_eq!(batch.approximate_size(), 0);
    batch.write(&key("a"), &vec![0u8; 100]).unwrap();
    let after_one = batch.approximate_size();
    assert!(after_one > 100);
    batch.write(&key("b"), &vec![0u8; 100]).unwrap();
    assert!(batch.approximate_size() > after_one);
}

#[test]
fn iterator_yields_ascending_keys_memory() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    for k in ["c", "a", "b"] {
        store.write(&key(k), &key("v"), false).unwrap();
    }

    let mut iter = store.iter().unwrap();
    iter.seek_to_first().unwrap();
    let mut keys = Vec::new();
    while iter.valid() {
        keys.push(iter.key::<String>().unwrap());
        iter.next().unwrap();
    }
    assert_eq!(keys, vec![key("a"), key("b"), key("c")]);
}

#[test]
fn iterator_yields_ascending_keys_disk() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());
    for k in ["c", "a", "b"] {
        store.write(&key(k), &key("v"), false).unwrap();
    }

    // Seek past the reserved bookkeeping entries straight to the caller
    // key space.
    let mut iter = store.iter().unwrap();
    iter.seek(&key("a")).unwrap();
    let mut keys = Vec::new();
    while iter.valid() {
        keys.push(iter.key::<String>().unwrap());
        iter.next().unwrap();
    }
    assert_eq!(keys, vec![key("a"), key("b"), key("c")]);
}

#[test]
fn iterator_decodes_obfuscated_values() {
    let dir = tempdir().unwrap();
    let store = Store::open(StoreParams::new(dir.path()).obfuscate(true)).unwrap();
    store.write(&key("k"), &key("masked"), false).unwrap();

    let mut iter = store.iter().unwrap();
    iter.seek(&key("k")).unwrap();
    assert!(iter.valid());
    assert_eq!(iter.value::<String>().unwrap(), key("masked"));
}

#[test]
fn is_empty_lifecycle() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());
    assert!(store.is_empty().unwrap());

    store.write(&key("only"), &1u64, false).unwrap();
    assert!(!store.is_empty().unwrap());

    store.erase(&key("only"), false).unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn is_empty_true_with_obfuscation_bookkeeping() {
    let dir = tempdir().unwrap();
    let store = Store::open(StoreParams::new(dir.path()).obfuscate(true)).unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn partition_fallback_tombstone_stops_scan() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());

    // Write "x" as a sorted key; the commit rolls the partition forward.
    let mut batch = store.create_batch().unwrap();
    batch.write_sorted(&key("x"), &key("v1")).unwrap();
    store.write_batch(&mut batch, false).unwrap();
    assert_eq!(
        store.read_sorted::<String, String>(&key("x")).unwrap(),
        Some(key("v1"))
    );

    // Tombstone in the next partition shadows the older value.
    let mut batch = store.create_batch().unwrap();
    batch.erase_sorted(&key("x")).unwrap();
    store.write_batch(&mut batch, false).unwrap();

    assert_eq!(store.read_sorted::<String, String>(&key("x")).unwrap(), None);
    assert!(!store.exists_sorted(&key("x")).unwrap());
}

#[test]
fn partition_fallback_scans_older_generations() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());

    let mut batch = store.create_batch().unwrap();
    batch.write_sorted(&key("old"), &key("v1")).unwrap();
    store.write_batch(&mut batch, false).unwrap();

    // Roll the partition a few more times with unrelated sorted writes.
    for i in 0..3u64 {
        let mut batch = store.create_batch().unwrap();
        batch.write_sorted(&i, &i).unwrap();
        store.write_batch(&mut batch, false).unwrap();
    }

    // "old" lives several generations back but is still found.
    assert_eq!(
        store.read_sorted::<String, String>(&key("old")).unwrap(),
        Some(key("v1"))
    );
}

#[test]
fn wipe_on_open_destroys_existing_data() {
    let dir = tempdir().unwrap();
    {
        let store = open_disk(dir.path());
        store.write(&key("a"), &1u64, true).unwrap();
    }
    let store = Store::open(StoreParams::new(dir.path()).wipe_data(true)).unwrap();
    assert!(!store.exists(&key("a")).unwrap());
    assert!(store.is_empty().unwrap());
}

#[test]
fn obfuscation_key_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let first_key;
    {
        let store = Store::open(StoreParams::new(dir.path()).obfuscate(true)).unwrap();
        first_key = store.obfuscation().to_string();
        store.write(&key("p"), &key("q"), false).unwrap();
    }
    let store = Store::open(StoreParams::new(dir.path()).obfuscate(true)).unwrap();
    assert_eq!(store.obfuscation().to_string(), first_key);
    assert_eq!(store.read::<String, String>(&key("p")).unwrap(), Some(key("q")));
}

#[test]
fn preexisting_plain_store_keeps_obfuscation_disabled() {
    let dir = tempdir().unwrap();
    {
        let store = open_disk(dir.path());
        store.write(&key("a"), &key("plain"), false).unwrap();
    }
    // Requesting obfuscation on a non-empty store must not corrupt the
    // existing plaintext data.
    let store = Store::open(StoreParams::new(dir.path()).obfuscate(true)).unwrap();
    assert!(!store.obfuscation().is_enabled());
    assert_eq!(store.read::<String, String>(&key("a")).unwrap(), Some(key("plain")));
}

#[test]
fn corrupt_value_reads_as_not_found() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    store.write(&key("k"), &vec![1u8, 2, 3], false).unwrap();
    // Three stored bytes cannot decode as u64.
    assert_eq!(store.read::<String, u64>(&key("k")).unwrap(), None);
    // The record is still there for the type that fits.
    assert!(store.exists(&key("k")).unwrap());
}

#[test]
fn estimate_size_memory_backend() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    store.write(&key("a"), &vec![0u8; 64], false).unwrap();
    store.write(&key("b"), &vec![0u8; 64], false).unwrap();
    let size = store.estimate_size(&key("a"), &key("z")).unwrap();
    assert!(size >= 128);
}

#[test]
fn estimate_size_inverted_range_is_zero() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    store.write(&key("a"), &1u64, false).unwrap();
    assert_eq!(store.estimate_size(&key("z"), &key("a")).unwrap(), 0);
}

#[test]
fn estimate_size_disk_is_lower_bound() {
    let dir = tempdir().unwrap();
    let store = open_disk(dir.path());
    store.write(&key("a"), &vec![0u8; 64], false).unwrap();
    // The B+Tree engine reports 0: valid but uninformative.
    assert_eq!(store.estimate_size(&key("a"), &key("z")).unwrap(), 0);
}

#[test]
fn sync_write_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = open_disk(dir.path());
        store.write(&key("durable"), &key("yes"), true).unwrap();
    }
    let store = open_disk(dir.path());
    assert_eq!(
        store.read::<String, String>(&key("durable")).unwrap(),
        Some(key("yes"))
    );
}

#[test]
fn force_compact_open_preserves_data() {
    let dir = tempdir().unwrap();
    {
        let store = open_disk(dir.path());
        store.write(&key("a"), &1u64, true).unwrap();
    }
    let store = Store::open(StoreParams::new(dir.path()).force_compact(true)).unwrap();
    assert_eq!(store.read::<String, u64>(&key("a")).unwrap(), Some(1));
}

#[test]
fn batch_reusable_after_commit() {
    let store = Store::open(StoreParams::in_memory()).unwrap();
    let mut batch = store.create_batch().unwrap();
    batch.write(&key("a"), &1u64).unwrap();
    store.write_batch(&mut batch, false).unwrap();

    batch.write(&key("b"), &2u64).unwrap();
    store.write_batch(&mut batch, false).unwrap();

    assert_eq!(store.read::<String, u64>(&key("a")).unwrap(), Some(1));
    assert_eq!(store.read::<String, u64>(&key("b")).unwrap(), Some(2));
}
