//! Recovery through the file-backed store.

use std::sync::Arc;

use ntest::timeout;
use tempfile::tempdir;

use kv_sink_core::{FileStore, Operation, OperationDb, Reader, SinkConfig, SinkError};

use super::helpers::{apply_block, cursor_at};

#[timeout(5000)]
#[test]
fn test_restart_resumes_from_cursor() {
    let dir = tempdir().unwrap();
    let config = SinkConfig::new(dir.path());

    {
        let store = Arc::new(FileStore::open(&config).unwrap());
        let mut db = OperationDb::new(store, &config);
        apply_block(&mut db, 1, None, vec![Operation::set("key.3", "value.3")], true).unwrap();
        apply_block(&mut db, 2, Some(1), vec![Operation::set("key.2", "value.2")], true).unwrap();
        // buffered but never flushed
        apply_block(&mut db, 3, Some(1), vec![Operation::set("key.1", "value.1")], false).unwrap();
    }

    let store = Arc::new(FileStore::open(&config).unwrap());
    let db = OperationDb::new(store, &config);
    assert_eq!(db.get_cursor().unwrap(), cursor_at(2));

    let reader = db.reader();
    assert_eq!(reader.get("key.3").unwrap(), b"value.3".to_vec());
    assert_eq!(reader.get("key.2").unwrap(), b"value.2".to_vec());
    assert_eq!(reader.get("key.1"), Err(SinkError::NotFound));
    assert_eq!(db.undo_block_numbers().unwrap(), vec![2]);
}

#[timeout(5000)]
#[test]
fn test_fork_after_restart() {
    let dir = tempdir().unwrap();
    let config = SinkConfig::new(dir.path());

    {
        let store = Arc::new(FileStore::open(&config).unwrap());
        let mut db = OperationDb::new(store, &config);
        apply_block(&mut db, 1, None, vec![Operation::set("key.3", "value.3")], true).unwrap();
        apply_block(&mut db, 2, Some(1), vec![Operation::set("key.2", "value.2")], true).unwrap();
        apply_block(&mut db, 3, Some(1), vec![Operation::set("key.1", "value.1")], true).unwrap();
    }

    let store = Arc::new(FileStore::open(&config).unwrap());
    let mut db = OperationDb::new(store, &config);
    assert_eq!(db.replay_undo(2).unwrap(), 1);
    db.flush(&cursor_at(2)).unwrap();
    db.discard_undo_above(2).unwrap();

    let reader = db.reader();
    assert_eq!(reader.get("key.1"), Err(SinkError::NotFound));
    assert_eq!(reader.get("key.2").unwrap(), b"value.2".to_vec());
    assert_eq!(db.get_cursor().unwrap(), cursor_at(2));
}
