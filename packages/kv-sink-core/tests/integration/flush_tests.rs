//! Flush and checkpoint behavior.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use ntest::timeout;

use kv_sink_core::{Cursor, Operation, OperationDb, Reader, SinkConfig, SinkError};

use super::helpers::{cursor_at, CountingStore};

fn counting_db() -> (Arc<CountingStore>, OperationDb<CountingStore>) {
    let store = Arc::new(CountingStore::default());
    let db = OperationDb::new(store.clone(), &SinkConfig::default());
    (store, db)
}

#[timeout(1000)]
#[test]
fn test_flush_idempotence() {
    let (store, mut db) = counting_db();
    db.add_operations(vec![Operation::set("a", "1"), Operation::delete("b")]);

    let cursor = cursor_at(7);
    assert_eq!(db.flush(&cursor).unwrap(), 2);
    let mutations = store.mutations();
    let flushes = store.flushes.load(Ordering::SeqCst);

    assert_eq!(db.flush(&cursor).unwrap(), 0);
    assert_eq!(store.mutations(), mutations);
    assert_eq!(store.flushes.load(Ordering::SeqCst), flushes);
}

#[timeout(1000)]
#[test]
fn test_empty_flush_with_new_cursor_moves_checkpoint() {
    let (store, mut db) = counting_db();
    db.flush(&cursor_at(1)).unwrap();
    let puts = store.puts.load(Ordering::SeqCst);

    assert_eq!(db.flush(&cursor_at(2)).unwrap(), 0);
    assert_eq!(store.puts.load(Ordering::SeqCst), puts + 1);
    assert_eq!(db.get_cursor().unwrap(), cursor_at(2));
}

#[timeout(1000)]
#[test]
fn test_failed_flush_keeps_cursor_and_retries() {
    let (store, mut db) = counting_db();
    db.add_operations(vec![Operation::set("a", "1")]);
    db.flush(&cursor_at(1)).unwrap();

    db.add_operations(vec![Operation::set("a", "2"), Operation::set("b", "2")]);
    store.fail_puts.store(true, Ordering::SeqCst);
    assert!(matches!(
        db.flush(&cursor_at(2)),
        Err(SinkError::Store(_))
    ));
    assert_eq!(db.get_cursor().unwrap(), cursor_at(1));
    assert_eq!(db.pending_len(), 2);

    store.fail_puts.store(false, Ordering::SeqCst);
    assert_eq!(db.flush(&cursor_at(2)).unwrap(), 2);

    let reader = db.reader();
    assert_eq!(reader.get("a").unwrap(), b"2".to_vec());
    assert_eq!(reader.get("b").unwrap(), b"2".to_vec());
    assert_eq!(db.get_cursor().unwrap(), cursor_at(2));
}

#[timeout(1000)]
#[test]
fn test_deletes_are_batched() {
    let (store, mut db) = counting_db();
    db.add_operations(vec![
        Operation::set("a", "1"),
        Operation::set("b", "1"),
        Operation::set("c", "1"),
    ]);
    db.flush(&cursor_at(1)).unwrap();
    let deletes = store.deletes.load(Ordering::SeqCst);

    db.add_operations(vec![
        Operation::delete("a"),
        Operation::delete("b"),
        Operation::delete("c"),
    ]);
    assert_eq!(db.flush(&cursor_at(2)).unwrap(), 3);
    assert_eq!(store.deletes.load(Ordering::SeqCst), deletes + 1);
}

#[timeout(1000)]
#[test]
fn test_cursor_with_colons_survives_flush() {
    let (_store, mut db) = counting_db();
    let cursor = Cursor::new("opaque:token:v2", "0xabc", 99);
    db.flush(&cursor).unwrap();
    assert_eq!(db.get_cursor().unwrap(), cursor);
}
