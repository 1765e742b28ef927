//! Tests for FragmentEngine
//!
//! These tests verify:
//! - The session/cursor handle table and UseAfterClose
//! - Buffered writes and the implicit flush bound
//! - Snapshot semantics of sessions and cursors
//! - Close discarding staged items

use fragkv::codec::encode;
use fragkv::engine::SessionId;
use fragkv::{Attribute, Config, Engine, FragmentEngine, ItemRecord, MapError, MapSchema};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, FragmentEngine, String) {
    let temp_dir = TempDir::new().unwrap();
    let uri = temp_dir.path().join("map").to_str().unwrap().to_string();
    let mut engine = FragmentEngine::new(Config::builder().sync_on_flush(false).build());
    engine.create(&uri, &schema()).unwrap();
    (temp_dir, engine, uri)
}

fn schema() -> MapSchema {
    MapSchema::builder()
        .attribute(Attribute::of::<u8>("x"))
        .attribute(Attribute::of::<u8>("y"))
        .build()
}

fn record(key: u16, x: u8, y: u8) -> ItemRecord {
    let mut record = ItemRecord::new(encode(&key));
    record.values.insert("x".to_string(), encode(&x));
    record.values.insert("y".to_string(), encode(&y));
    record
}

fn open_all(engine: &mut FragmentEngine, uri: &str) -> SessionId {
    engine.open(uri, &[]).unwrap()
}

fn collect_keys(engine: &mut FragmentEngine, session: SessionId) -> Vec<u16> {
    let cursor = engine.iter_alloc(session).unwrap();
    let mut keys = Vec::new();
    while !engine.iter_done(cursor).unwrap() {
        keys.push(engine.iter_here(cursor).unwrap().key.decode::<u16>().unwrap());
        engine.iter_next(cursor).unwrap();
    }
    engine.iter_free(cursor);
    keys
}

// =============================================================================
// Handle Table Tests
// =============================================================================

#[test]
fn test_sessions_get_distinct_ids() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let a = open_all(&mut engine, &uri);
    let b = open_all(&mut engine, &uri);
    assert_ne!(a, b);
    assert_eq!(engine.session_count(), 2);
}

#[test]
fn test_closed_session_is_use_after_close() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);
    engine.close(session).unwrap();

    assert!(matches!(
        engine.flush(session),
        Err(MapError::UseAfterClose(id)) if id == session.0
    ));
    assert!(matches!(
        engine.has_key(session, &encode(&1u16)),
        Err(MapError::UseAfterClose(_))
    ));
    assert!(matches!(
        engine.close(session),
        Err(MapError::UseAfterClose(_))
    ));
}

#[test]
fn test_close_frees_cursors() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);
    let cursor = engine.iter_alloc(session).unwrap();
    assert_eq!(engine.cursor_count(), 1);

    engine.close(session).unwrap();
    assert_eq!(engine.cursor_count(), 0);
    assert!(matches!(
        engine.iter_done(cursor),
        Err(MapError::UseAfterClose(_))
    ));

    // Freeing an unknown cursor is harmless
    engine.iter_free(cursor);
}

// =============================================================================
// Buffered Write Tests
// =============================================================================

#[test]
fn test_flush_publishes_buffer() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);

    engine.add_item(session, record(1, 1, 1)).unwrap();
    assert!(engine.is_dirty(session).unwrap());
    assert!(!engine.has_key(session, &encode(&1u16)).unwrap());

    engine.flush(session).unwrap();
    assert!(!engine.is_dirty(session).unwrap());
    assert!(engine.has_key(session, &encode(&1u16)).unwrap());
}

#[test]
fn test_max_buffered_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let uri = temp_dir.path().join("map").to_str().unwrap().to_string();
    let config = Config::builder()
        .sync_on_flush(false)
        .max_buffered_items(3)
        .build();
    let mut engine = FragmentEngine::new(config);
    engine.create(&uri, &schema()).unwrap();
    let session = open_all(&mut engine, &uri);

    engine.add_item(session, record(1, 0, 0)).unwrap();
    engine.add_item(session, record(2, 0, 0)).unwrap();
    assert!(engine.is_dirty(session).unwrap());

    engine.add_item(session, record(3, 0, 0)).unwrap();
    assert!(!engine.is_dirty(session).unwrap());
    assert_eq!(collect_keys(&mut engine, session), vec![1, 2, 3]);
}

#[test]
fn test_close_discards_staged_items() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);
    engine.add_item(session, record(1, 1, 1)).unwrap();
    engine.close(session).unwrap();

    let fresh = open_all(&mut engine, &uri);
    assert!(!engine.has_key(fresh, &encode(&1u16)).unwrap());
}

#[test]
fn test_get_item_projects_open_attributes() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let writer = open_all(&mut engine, &uri);
    engine.add_item(writer, record(1, 10, 20)).unwrap();
    engine.flush(writer).unwrap();

    let only_y = engine.open(&uri, &["y".to_string()]).unwrap();
    assert_eq!(engine.open_attributes(only_y).unwrap(), vec!["y"]);

    let item = engine.get_item(only_y, &encode(&1u16)).unwrap();
    assert_eq!(item.values.len(), 1);
    assert_eq!(item.values["y"].decode::<u8>().unwrap(), 20);

    assert!(matches!(
        engine.get_item(only_y, &encode(&2u16)),
        Err(MapError::KeyNotFound)
    ));
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_session_snapshot_until_reopen() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let reader = open_all(&mut engine, &uri);
    let writer = open_all(&mut engine, &uri);

    engine.add_item(reader, record(7, 7, 7)).unwrap();
    engine.add_item(writer, record(1, 1, 1)).unwrap();
    engine.flush(writer).unwrap();

    assert!(collect_keys(&mut engine, reader).is_empty());

    engine.reopen(reader).unwrap();
    assert_eq!(collect_keys(&mut engine, reader), vec![1]);
    assert!(engine.is_dirty(reader).unwrap());
}

#[test]
fn test_cursor_reset_takes_new_snapshot() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);
    engine.add_item(session, record(1, 0, 0)).unwrap();
    engine.flush(session).unwrap();

    let cursor = engine.iter_alloc(session).unwrap();
    engine.add_item(session, record(2, 0, 0)).unwrap();
    engine.flush(session).unwrap();

    engine.iter_next(cursor).unwrap();
    assert!(engine.iter_done(cursor).unwrap());

    engine.iter_reset(cursor).unwrap();
    engine.iter_next(cursor).unwrap();
    assert!(!engine.iter_done(cursor).unwrap());
    assert_eq!(
        engine.iter_here(cursor).unwrap().key.decode::<u16>().unwrap(),
        2
    );
}

#[test]
fn test_iter_here_on_exhausted_cursor_fails() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);
    let cursor = engine.iter_alloc(session).unwrap();

    assert!(engine.iter_done(cursor).unwrap());
    assert!(matches!(engine.iter_here(cursor), Err(MapError::Engine(_))));

    // Advancing past the end stays at the end
    engine.iter_next(cursor).unwrap();
    assert!(engine.iter_done(cursor).unwrap());
}

#[test]
fn test_consolidate_keeps_open_sessions_readable() {
    let (_temp, mut engine, uri) = setup_temp_engine();
    let session = open_all(&mut engine, &uri);
    for key in 1..=3u16 {
        engine.add_item(session, record(key, 0, 0)).unwrap();
        engine.flush(session).unwrap();
    }

    engine.consolidate(&uri).unwrap();
    assert_eq!(collect_keys(&mut engine, session), vec![1, 2, 3]);

    engine.reopen(session).unwrap();
    assert_eq!(collect_keys(&mut engine, session), vec![1, 2, 3]);
}
