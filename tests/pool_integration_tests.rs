//! Integration Tests for Cache Pools
//!
//! Exercises the durable pools against real and failure-injecting storage.

mod common;

use std::sync::Arc;

use serde_json::json;

use cache_pools::cache::{
    record_id, CachePool, DeleteExpiredItems, FilePool, Interval, RecordPool, Ttl,
};
use cache_pools::clock::{Clock, FrozenClock};
use cache_pools::storage::{
    FileStore, LocalFileStore, MemoryFileStore, RecordStore, SqliteRecordStore, TableLayout,
};

use common::{FlakyFileStore, FlakyRecordStore};

// == Helper Functions ==

fn clock() -> Arc<FrozenClock> {
    FrozenClock::default().shared()
}

fn flaky_file_pool(clock: &Arc<FrozenClock>) -> (FilePool<FlakyFileStore>, FlakyFileStore) {
    let store = FlakyFileStore::default();
    let pool = FilePool::new(store.clone(), "pool", clock.clone(), None).unwrap();
    (pool, store)
}

fn flaky_record_pool(clock: &Arc<FrozenClock>) -> (RecordPool<FlakyRecordStore>, FlakyRecordStore) {
    let store = FlakyRecordStore::default();
    let pool = RecordPool::new(store.clone(), "pool", clock.clone(), None).unwrap();
    (pool, store)
}

fn save_value<P: CachePool>(pool: &mut P, key: &str, value: serde_json::Value, ttl: Option<Ttl>) {
    let mut item = pool.get_item(key).unwrap();
    item.set(value).expires_after(ttl);
    assert!(pool.save(&mut item));
}

// == Save Rollback ==

#[test]
fn test_failed_save_rolls_back_hit_flag() {
    let clock = clock();
    let (mut pool, store) = flaky_file_pool(&clock);
    store.faults.fail_writes(true);

    let mut item = pool.get_item("foo").unwrap();
    item.set("bar");
    assert!(!pool.save(&mut item));
    assert!(!item.is_hit());

    store.faults.reset();
    assert!(!pool.has_item("foo").unwrap());
    assert!(pool.save(&mut item));
    assert!(item.is_hit());
}

#[test]
fn test_failed_record_save_rolls_back_hit_flag() {
    let clock = clock();
    let (mut pool, store) = flaky_record_pool(&clock);
    store.faults.fail_target(record_id("pool", "foo"));

    let mut item = pool.get_item("foo").unwrap();
    item.set(1);
    assert!(!pool.save(&mut item));
    assert!(!item.is_hit());
    assert!(store.inner.is_empty());
}

// == Commit Retry ==

#[test]
fn test_commit_keeps_failed_items_for_retry() {
    let clock = clock();
    let (mut pool, store) = flaky_file_pool(&clock);
    store.faults.fail_target(pool.storage_path("b"));

    for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
        let mut item = pool.get_item(key).unwrap();
        item.set(value);
        assert!(pool.save_deferred(item));
    }

    assert!(!pool.commit());
    assert_eq!(pool.deferred_len(), 1);
    assert!(pool.has_item("a").unwrap());
    assert!(pool.has_item("c").unwrap());

    let pending = pool.get_item("b").unwrap();
    assert!(!pending.is_hit(), "queued item is not a hit before commit");

    store.faults.reset();
    assert!(pool.commit());
    assert_eq!(pool.deferred_len(), 0);
    assert_eq!(pool.get_item("b").unwrap().get(), Some(&json!(2)));
}

#[test]
fn test_record_commit_retry() {
    let clock = clock();
    let (mut pool, store) = flaky_record_pool(&clock);
    store.faults.fail_writes(true);

    let mut item = pool.get_item("foo").unwrap();
    item.set("bar");
    pool.save_deferred(item);
    assert!(!pool.commit());
    assert!(!pool.commit());
    assert_eq!(pool.deferred_len(), 1);

    store.faults.reset();
    assert!(pool.close());
    assert_eq!(store.inner.len(), 1);
}

#[test]
fn test_drop_flushes_deferred_items() {
    let clock = clock();
    let store = MemoryFileStore::new();
    {
        let mut pool = FilePool::new(store.clone(), "pool", clock.clone(), None).unwrap();
        let mut item = pool.get_item("foo").unwrap();
        item.set("bar");
        pool.save_deferred(item);
    }

    let mut pool = FilePool::new(store, "pool", clock, None).unwrap();
    assert_eq!(pool.get_item("foo").unwrap().get(), Some(&json!("bar")));
}

// == Read and Delete Failures ==

#[test]
fn test_read_failure_is_a_miss() {
    let clock = clock();
    let (mut pool, store) = flaky_file_pool(&clock);
    save_value(&mut pool, "foo", json!(1), None);

    store.faults.fail_reads(true);
    let item = pool.get_item("foo").unwrap();
    assert!(!item.is_hit());

    store.faults.reset();
    assert!(pool.has_item("foo").unwrap());
}

#[test]
fn test_get_items_without_keys_skips_storage() {
    let clock = clock();
    let (mut file_pool, file_store) = flaky_file_pool(&clock);
    let (mut record_pool, record_store) = flaky_record_pool(&clock);
    file_store.faults.fail_reads(true);
    record_store.faults.fail_reads(true);

    assert!(file_pool.get_items(&[]).unwrap().is_empty());
    assert!(record_pool.get_items(&[]).unwrap().is_empty());
}

#[test]
fn test_delete_items_attempts_every_key() {
    let clock = clock();
    let (mut pool, store) = flaky_file_pool(&clock);
    for key in ["a", "b", "c"] {
        save_value(&mut pool, key, json!(key), None);
    }

    store.faults.fail_target(pool.storage_path("a"));
    assert!(!pool.delete_items(&["a", "b", "c"]).unwrap());
    assert!(pool.has_item("a").unwrap());
    assert!(!pool.has_item("b").unwrap());
    assert!(!pool.has_item("c").unwrap());
}

#[test]
fn test_clear_failure_reports_false() {
    let clock = clock();
    let (mut pool, store) = flaky_record_pool(&clock);
    save_value(&mut pool, "foo", json!(1), None);

    store.faults.fail_deletes(true);
    assert!(!pool.clear());
    store.faults.reset();
    assert!(pool.clear());
    assert!(store.inner.is_empty());
}

// == Sweeping ==

#[test]
fn test_file_sweep_continues_past_failures() {
    let clock = clock();
    let (mut pool, store) = flaky_file_pool(&clock);
    for key in ["a", "b", "c"] {
        save_value(&mut pool, key, json!(key), Some(Ttl::Seconds(10)));
    }
    save_value(&mut pool, "forever", json!(0), None);
    store
        .inner
        .write("pool/garbage.cache", b"not json")
        .unwrap();
    store.inner.write("pool/notes.txt", b"keep me").unwrap();

    clock.advance_secs(11);
    store.faults.fail_target(pool.storage_path("b"));

    assert!(!pool.delete_expired_items());
    assert!(store.inner.read(&pool.storage_path("a")).is_err());
    assert!(store.inner.read(&pool.storage_path("b")).is_ok());
    assert!(store.inner.read(&pool.storage_path("c")).is_err());
    assert!(store.inner.read("pool/garbage.cache").is_err());
    assert!(store.inner.read("pool/notes.txt").is_ok());
    assert!(pool.has_item("forever").unwrap());

    store.faults.reset();
    assert!(pool.delete_expired_items());
    assert_eq!(store.inner.len(), 2);
}

#[test]
fn test_record_sweep_failure() {
    let clock = clock();
    let (mut pool, store) = flaky_record_pool(&clock);
    save_value(&mut pool, "foo", json!(1), Some(Ttl::Seconds(1)));
    clock.advance_secs(2);

    store.faults.fail_deletes(true);
    assert!(!pool.delete_expired_items());
    assert_eq!(store.inner.len(), 1);

    store.faults.reset();
    assert!(pool.delete_expired_items());
    assert!(store.inner.is_empty());
}

#[test]
fn test_sweeper_is_exposed_through_trait_objects() {
    let clock = clock();
    let mut pools: Vec<Box<dyn CachePool>> = vec![
        Box::new(FilePool::new(MemoryFileStore::new(), "pool", clock.clone(), None).unwrap()),
        Box::new(cache_pools::MemoryPool::new(clock.clone(), None)),
    ];

    assert!(pools[0].expired_items_sweeper().is_some());
    assert!(pools[1].expired_items_sweeper().is_none());
}

// == On-Disk Backends ==

#[test]
fn test_local_file_pool_persists_between_instances() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    {
        let store = LocalFileStore::open(dir.path()).unwrap();
        let mut pool = FilePool::new(store, "app", clock.clone(), None).unwrap();
        save_value(&mut pool, "user.1", json!({"name": "Ada"}), None);

        let path = pool.storage_path("user.1");
        assert!(path.starts_with("app/"));
        assert!(path.ends_with(".cache"));
        assert!(dir.path().join(&path).is_file());
    }

    let store = LocalFileStore::open(dir.path()).unwrap();
    let mut pool = FilePool::new(store, "app", clock, None).unwrap();
    assert_eq!(
        pool.get_item("user.1").unwrap().get(),
        Some(&json!({"name": "Ada"}))
    );

    assert!(pool.clear());
    assert!(!dir.path().join("app").exists());
    assert!(!pool.has_item("user.1").unwrap());
}

#[test]
fn test_local_file_pool_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let store = LocalFileStore::open(dir.path()).unwrap();
    let mut pool = FilePool::new(store, "app", clock.clone(), None).unwrap();

    save_value(&mut pool, "short", json!(1), Some(Ttl::Seconds(5)));
    save_value(&mut pool, "long", json!(2), Some(Ttl::Seconds(500)));

    clock.advance_secs(6);
    assert!(pool.delete_expired_items());
    assert!(!dir.path().join(pool.storage_path("short")).exists());
    assert!(dir.path().join(pool.storage_path("long")).exists());
}

#[cfg(unix)]
#[test]
fn test_local_sweep_survives_vanished_files() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let store = LocalFileStore::open(dir.path()).unwrap();
    let mut pool = FilePool::new(store, "app", clock.clone(), None).unwrap();

    save_value(&mut pool, "first", json!(1), Some(Ttl::Seconds(5)));
    save_value(&mut pool, "second", json!(2), Some(Ttl::Seconds(5)));
    save_value(&mut pool, "kept", json!(3), None);
    std::os::unix::fs::symlink(
        dir.path().join("app/deleted-elsewhere.cache"),
        dir.path().join("app/0000.cache"),
    )
    .unwrap();

    clock.advance_secs(6);
    assert!(pool.delete_expired_items());
    assert!(!dir.path().join(pool.storage_path("first")).exists());
    assert!(!dir.path().join(pool.storage_path("second")).exists());
    assert!(pool.has_item("kept").unwrap());
}

#[test]
fn test_sqlite_pools_share_a_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cache.sqlite3");
    let clock = clock();

    {
        let store = SqliteRecordStore::open(&db, TableLayout::default()).unwrap();
        let mut pool = RecordPool::new(store, "sessions", clock.clone(), None).unwrap();
        save_value(&mut pool, "s1", json!("token"), Some(Ttl::Seconds(60)));
    }
    {
        let store = SqliteRecordStore::open(&db, TableLayout::default()).unwrap();
        let mut pool = RecordPool::new(store, "pages", clock.clone(), None).unwrap();
        save_value(&mut pool, "s1", json!("<html>"), None);
        assert!(pool.clear());
    }

    let store = SqliteRecordStore::open(&db, TableLayout::default()).unwrap();
    assert!(store.find(&record_id("sessions", "s1")).unwrap().is_some());
    let mut pool = RecordPool::new(store, "sessions", clock.clone(), None).unwrap();
    assert_eq!(pool.get_item("s1").unwrap().get(), Some(&json!("token")));

    clock.advance_secs(61);
    assert!(!pool.has_item("s1").unwrap());
}

// == TTL Forms ==

#[test]
fn test_calendar_interval_ttl() {
    let clock = clock();
    let mut pool = FilePool::new(MemoryFileStore::new(), "pool", clock.clone(), None).unwrap();
    let start = clock.now();

    let mut item = pool.get_item("monthly").unwrap();
    item.set(true)
        .expires_after(Ttl::from(Interval::months(1).with_days(1)));
    assert!(pool.save(&mut item));

    let expiration = item.expiration().unwrap();
    assert!(expiration > start + chrono::TimeDelta::days(28));

    clock.set(expiration);
    assert!(pool.has_item("monthly").unwrap());
    clock.set(expiration + chrono::TimeDelta::seconds(1));
    assert!(!pool.has_item("monthly").unwrap());
}

#[test]
fn test_pool_default_ttl_applies_to_fresh_items() {
    let clock = clock();
    let mut pool = RecordPool::new(
        cache_pools::storage::MemoryRecordStore::new(),
        "pool",
        clock.clone(),
        Some(Ttl::Seconds(30)),
    )
    .unwrap();

    let mut item = pool.get_item("foo").unwrap();
    assert_eq!(
        item.expiration(),
        Some(clock.now() + chrono::TimeDelta::seconds(30))
    );
    item.set("bar");
    pool.save(&mut item);

    clock.advance_secs(31);
    assert!(!pool.has_item("foo").unwrap());
}
