//! Recovery tests for the persistent version store.
//!
//! These tests verify that:
//! - Reopening a store answers every query exactly as before
//! - A torn final log entry is dropped and later appends stay readable
//! - Corruption before the final entry fails the open and leaves the log alone
//! - Versions sharing a `known_at` resolve the same way after a reopen
//! - Only one process can hold a store directory open

#![cfg(feature = "persistent")]

use std::fs;
use std::io::Write;
use std::sync::Arc;

use bitempo::storage::persistent::{open_store, PersistentConfig, WAL_FILE};
use bitempo::{BitemporalEngine, PutBuilder, StorageError, TxRange, Value};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::tempdir;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn put(engine: &BitemporalEngine, amount: i64, from: DateTime<Utc>, known_at: DateTime<Utc>) {
    PutBuilder::new("acct-1")
        .attribute("balance", amount)
        .attribute("tags", serde_json::json!(["checking", "primary"]))
        .valid_from(from)
        .known_at(known_at)
        .build()
        .unwrap()
        .execute(engine)
        .unwrap();
}

#[test]
fn test_reopen_answers_identically() {
    let dir = tempdir().unwrap();
    let queries = [
        (at(2020, 6, 1), at(2020, 6, 1)),
        (at(2020, 6, 1), at(2020, 8, 1)),
        (at(2019, 6, 1), at(2020, 8, 1)),
    ];

    let (before, history_before) = {
        let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
        put(&engine, 100, at(2020, 1, 1), at(2020, 1, 1));
        put(&engine, 150, at(2020, 1, 1), at(2020, 7, 1));

        let answers: Vec<_> = queries
            .iter()
            .map(|&(valid, as_of)| engine.get("acct-1", Some(valid), Some(as_of)).unwrap())
            .collect();
        (answers, engine.history("acct-1", TxRange::all()).unwrap())
    };

    let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
    let after: Vec<_> = queries
        .iter()
        .map(|&(valid, as_of)| engine.get("acct-1", Some(valid), Some(as_of)).unwrap())
        .collect();

    assert_eq!(before, after);
    assert_eq!(history_before, engine.history("acct-1", TxRange::all()).unwrap());
    assert_eq!(
        after[1].as_ref().and_then(|v| v.get("balance")).and_then(Value::as_int),
        Some(150)
    );
    assert!(after[2].is_none());
}

#[test]
fn test_torn_tail_is_dropped() {
    let dir = tempdir().unwrap();
    let base = at(2020, 1, 1);

    {
        let store = open_store(dir.path(), None).unwrap();
        let engine = BitemporalEngine::new(Arc::new(store));
        for i in 0..5 {
            put(&engine, i, base, base + Duration::days(i));
        }
    }

    // Simulate a crash mid-append: a frame header promising more bytes
    // than were written.
    {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(WAL_FILE))
            .unwrap();
        file.write_all(&[1, 0xff, 0x00, 0x00, 0x00, b'{']).unwrap();
    }

    {
        let store = open_store(dir.path(), None).unwrap();
        assert_eq!(store.len().unwrap(), 5);
        let engine = BitemporalEngine::new(Arc::new(store));
        put(&engine, 5, base, base + Duration::days(5));
    }

    let store = open_store(dir.path(), None).unwrap();
    assert_eq!(store.len().unwrap(), 6);
    let engine = BitemporalEngine::new(Arc::new(store));
    let latest = engine
        .get("acct-1", Some(base), Some(at(2021, 1, 1)))
        .unwrap()
        .unwrap();
    assert_eq!(latest.get("balance"), Some(&Value::Int(5)));
}

#[test]
fn test_truncated_log_keeps_complete_entries() {
    let dir = tempdir().unwrap();
    let base = at(2020, 1, 1);

    {
        let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
        for i in 0..5 {
            put(&engine, i, base, base + Duration::days(i));
        }
    }

    let wal_path = dir.path().join(WAL_FILE);
    let size = fs::metadata(&wal_path).unwrap().len();
    fs::OpenOptions::new()
        .write(true)
        .open(&wal_path)
        .unwrap()
        .set_len(size - 3)
        .unwrap();

    let store = open_store(dir.path(), None).unwrap();
    assert_eq!(store.len().unwrap(), 4);
}

#[test]
fn test_store_is_exclusive() {
    let dir = tempdir().unwrap();
    let _held = open_store(dir.path(), None).unwrap();

    let err = open_store(dir.path(), None).unwrap_err();
    assert!(matches!(err, StorageError::Locked(_)));
}

#[test]
fn test_unsynced_config_still_persists_on_drop() {
    let dir = tempdir().unwrap();
    let config = PersistentConfig {
        sync_on_write: false,
    };

    {
        let engine =
            BitemporalEngine::new(Arc::new(open_store(dir.path(), Some(config.clone())).unwrap()));
        put(&engine, 100, at(2020, 1, 1), at(2020, 1, 1));
    }

    let store = open_store(dir.path(), Some(config)).unwrap();
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn test_stray_bytes_do_not_cost_later_puts() {
    let dir = tempdir().unwrap();
    let base = at(2020, 1, 1);

    {
        let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
        put(&engine, 1, base, base);

        // Leftover of an append that failed halfway.
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(WAL_FILE))
            .unwrap();
        file.write_all(&[1, 0x40, 0x00, 0x00, 0x00, b'{']).unwrap();
        drop(file);

        put(&engine, 2, base, base + Duration::days(1));
    }

    let store = open_store(dir.path(), None).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    let engine = BitemporalEngine::new(Arc::new(store));
    let latest = engine
        .get("acct-1", Some(base), Some(at(2021, 1, 1)))
        .unwrap()
        .unwrap();
    assert_eq!(latest.get("balance"), Some(&Value::Int(2)));
}

#[test]
fn test_mid_log_corruption_fails_open_without_data_loss() {
    let dir = tempdir().unwrap();
    let base = at(2020, 1, 1);

    {
        let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
        for i in 0..5 {
            put(&engine, i, base, base + Duration::days(i));
        }
    }

    let wal_path = dir.path().join(WAL_FILE);
    let mut bytes = fs::read(&wal_path).unwrap();
    bytes[12] ^= 0xff;
    fs::write(&wal_path, &bytes).unwrap();

    let err = open_store(dir.path(), None).unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
    // Nothing was cut off; the file can still be repaired by hand.
    assert_eq!(fs::read(&wal_path).unwrap(), bytes);
}

#[test]
fn test_equal_known_at_answer_survives_reopen() {
    let dir = tempdir().unwrap();
    let base = at(2020, 1, 1);

    let before = {
        let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
        put(&engine, 100, base, base);
        put(&engine, 200, base, base);
        engine.get("acct-1", Some(base), Some(base)).unwrap()
    };
    assert_eq!(
        before.as_ref().and_then(|v| v.get("balance")),
        Some(&Value::Int(200))
    );

    let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
    assert_eq!(engine.get("acct-1", Some(base), Some(base)).unwrap(), before);
}

#[test]
fn test_concurrent_equal_known_at_puts_resolve_the_same_after_reopen() {
    let dir = tempdir().unwrap();
    let base = at(2020, 1, 1);

    let before = {
        let engine = BitemporalEngine::new(Arc::new(open_store(
            dir.path(),
            Some(PersistentConfig {
                sync_on_write: false,
            }),
        )
        .unwrap()));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        put(&engine, t * 100 + i, base, base);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        engine.get("acct-1", Some(base), Some(base)).unwrap()
    };

    let engine = BitemporalEngine::new(Arc::new(open_store(dir.path(), None).unwrap()));
    assert_eq!(engine.get("acct-1", Some(base), Some(base)).unwrap(), before);
    assert_eq!(engine.history("acct-1", TxRange::all()).unwrap().len(), 100);
}
