//! Reorg scenarios over the in-memory store.

use ntest::timeout;

use kv_sink_core::{Operation, Reader, SinkError};

use super::helpers::{apply_block, cursor_at, memory_db, physical_keys};

fn run_three_blocks() -> (
    std::sync::Arc<kv_sink_core::MemoryStore>,
    kv_sink_core::OperationDb<kv_sink_core::MemoryStore>,
) {
    let (store, mut db) = memory_db();
    apply_block(&mut db, 1, None, vec![Operation::set("key.3", "value.3")], true).unwrap();
    apply_block(&mut db, 2, Some(1), vec![Operation::set("key.2", "value.2")], true).unwrap();
    apply_block(&mut db, 3, Some(1), vec![Operation::set("key.1", "value.1")], true).unwrap();
    (store, db)
}

#[timeout(1000)]
#[test]
fn test_single_block() {
    let (store, mut db) = memory_db();
    let applied = apply_block(&mut db, 3, None, vec![Operation::set("key.1", "value.1")], true)
        .unwrap();

    assert_eq!(applied, 1);
    assert_eq!(
        physical_keys(&store),
        vec!["user:key.1", "cursor", "undo:3"]
    );
}

#[timeout(1000)]
#[test]
fn test_multi_block_undo_survival() {
    let (store, db) = run_three_blocks();

    assert_eq!(
        physical_keys(&store),
        vec![
            "user:key.1",
            "user:key.2",
            "user:key.3",
            "cursor",
            "undo:3",
            "undo:2",
        ]
    );
    assert_eq!(db.undo_block_numbers().unwrap(), vec![3, 2]);
}

#[timeout(1000)]
#[test]
fn test_fork_replay() {
    let (_store, mut db) = run_three_blocks();

    assert_eq!(db.replay_undo(2).unwrap(), 1);
    db.flush(&cursor_at(2)).unwrap();

    let reader = db.reader();
    assert_eq!(reader.get("key.1"), Err(SinkError::NotFound));
    assert_eq!(reader.get("key.2").unwrap(), b"value.2".to_vec());
    assert_eq!(reader.get("key.3").unwrap(), b"value.3".to_vec());
    assert_eq!(db.get_cursor().unwrap().block_number, 2);
}

#[timeout(1000)]
#[test]
fn test_fork_cleanup_drops_replayed_records() {
    let (_store, mut db) = run_three_blocks();

    db.replay_undo(1).unwrap();
    db.flush(&cursor_at(1)).unwrap();
    assert_eq!(db.discard_undo_above(1).unwrap(), 2);
    assert!(db.undo_block_numbers().unwrap().is_empty());

    let reader = db.reader();
    assert_eq!(reader.get("key.1"), Err(SinkError::NotFound));
    assert_eq!(reader.get("key.2"), Err(SinkError::NotFound));
    assert_eq!(reader.get("key.3").unwrap(), b"value.3".to_vec());
}

#[timeout(1000)]
#[test]
fn test_undo_round_trip_restores_touched_keys() {
    let (_store, mut db) = memory_db();
    apply_block(
        &mut db,
        1,
        None,
        vec![
            Operation::set("a", "a0"),
            Operation::set("b", "b0"),
            Operation::set("c", "c0"),
        ],
        true,
    )
    .unwrap();

    apply_block(
        &mut db,
        2,
        Some(0),
        vec![
            Operation::set("a", "a1"),
            Operation::delete("b"),
            Operation::set("d", "d1"),
            Operation::delete("never-existed"),
            Operation::set("a", "a2"),
        ],
        true,
    )
    .unwrap();

    db.replay_undo(1).unwrap();
    db.flush(&cursor_at(1)).unwrap();

    let reader = db.reader();
    assert_eq!(reader.get("a").unwrap(), b"a0".to_vec());
    assert_eq!(reader.get("b").unwrap(), b"b0".to_vec());
    assert_eq!(reader.get("c").unwrap(), b"c0".to_vec());
    assert_eq!(reader.get("d"), Err(SinkError::NotFound));
    assert_eq!(reader.get("never-existed"), Err(SinkError::NotFound));
}

#[timeout(1000)]
#[test]
fn test_purge_correctness() {
    let (_store, db) = memory_db();
    for block in 1..=6 {
        db.record_undo(block, &[Operation::set("k", block.to_string())])
            .unwrap();
    }

    assert_eq!(db.purge_undo(4).unwrap(), 4);
    assert_eq!(db.undo_block_numbers().unwrap(), vec![6, 5]);
}

/// Two blocks buffered before one flush: both undo records are computed
/// against the committed state from before the window.
#[timeout(1000)]
#[test]
fn test_multi_block_before_flush() {
    // full rollback of the window is exact
    let (_store, mut db) = memory_db();
    apply_block(&mut db, 1, None, vec![Operation::set("a", "0")], true).unwrap();
    apply_block(&mut db, 2, Some(0), vec![Operation::set("a", "2")], false).unwrap();
    apply_block(&mut db, 3, Some(0), vec![Operation::set("a", "3")], true).unwrap();
    assert_eq!(db.reader().get("a").unwrap(), b"3".to_vec());

    db.replay_undo(1).unwrap();
    db.flush(&cursor_at(1)).unwrap();
    assert_eq!(db.reader().get("a").unwrap(), b"0".to_vec());

    // a partial rollback inside the window restores the pre-window value,
    // not the value written by block 2
    let (_store, mut db) = memory_db();
    apply_block(&mut db, 1, None, vec![Operation::set("a", "0")], true).unwrap();
    apply_block(&mut db, 2, Some(0), vec![Operation::set("a", "2")], false).unwrap();
    apply_block(&mut db, 3, Some(0), vec![Operation::set("a", "3")], true).unwrap();

    db.replay_undo(2).unwrap();
    db.flush(&cursor_at(2)).unwrap();
    assert_eq!(db.reader().get("a").unwrap(), b"0".to_vec());
}

#[timeout(1000)]
#[test]
fn test_multi_block_before_flush_new_key() {
    let (_store, mut db) = memory_db();
    apply_block(&mut db, 1, None, vec![Operation::set("a", "1")], false).unwrap();
    apply_block(&mut db, 2, Some(0), vec![Operation::set("a", "2")], true).unwrap();

    db.replay_undo(0).unwrap();
    db.flush(&cursor_at(0)).unwrap();
    assert_eq!(db.reader().get("a"), Err(SinkError::NotFound));
}
