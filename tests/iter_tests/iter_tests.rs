//! Tests for MapIter
//!
//! These tests verify:
//! - Iteration in key order over durable items only
//! - Key type filtering (order preserved, long non-matching runs skipped)
//! - reset() reproducing the same sequence
//! - End-of-iteration equality
//! - Bound items yielded by iteration

use fragkv::{Attribute, Config, Context, MapError, MapSchema, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let uri = temp_dir.path().join("map");
    let ctx = Context::new(Config::builder().sync_on_flush(false).build());
    let schema = MapSchema::builder()
        .attribute(Attribute::of::<u32>("n"))
        .build();
    let store = Store::create(&ctx, uri.to_str().unwrap(), &schema).unwrap();
    (temp_dir, store)
}

/// Mixed keys: i32 1..=3, strings "a".."c", and i64 10
fn setup_mixed_store() -> (TempDir, Store) {
    let (temp, store) = setup_temp_store();
    for (i, key) in ["c", "a", "b"].iter().enumerate() {
        let mut item = store.create_item(*key);
        item.set("n", &(i as u32)).unwrap();
        store.add_item(&item).unwrap();
    }
    for key in [3i32, 1, 2] {
        let mut item = store.create_item(&key);
        item.set("n", &(key as u32)).unwrap();
        store.add_item(&item).unwrap();
    }
    let mut wide = store.create_item(&10i64);
    wide.set("n", &10u32).unwrap();
    store.add_item(&wide).unwrap();

    store.flush().unwrap();
    (temp, store)
}

fn i32_keys(store: &Store) -> Vec<i32> {
    let mut iter = store.iter().unwrap();
    iter.limit_key_type::<i32>();
    iter.map(|item| item.unwrap().key::<i32>().unwrap()).collect()
}

// =============================================================================
// Unfiltered Iteration Tests
// =============================================================================

#[test]
fn test_iterates_every_durable_item() {
    let (_temp, store) = setup_mixed_store();
    assert_eq!(store.iter().unwrap().count(), 7);
}

#[test]
fn test_iteration_skips_unflushed_items() {
    let (_temp, store) = setup_temp_store();

    let mut item = store.create_item(&1i32);
    item.set("n", &1u32).unwrap();
    store.add_item(&item).unwrap();

    assert_eq!(store.iter().unwrap().count(), 0);
    store.flush().unwrap();
    assert_eq!(store.iter().unwrap().count(), 1);
}

#[test]
fn test_same_type_keys_come_out_in_stored_order() {
    let (_temp, store) = setup_mixed_store();

    let keys: Vec<String> = store
        .iter()
        .unwrap()
        .map(|item| item.unwrap())
        .filter_map(|item| item.key::<String>().ok())
        .collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[test]
fn test_flush_during_iteration_does_not_disturb_it() {
    let (_temp, store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    assert!(iter.advance().unwrap());

    let mut item = store.create_item(&99i32);
    item.set("n", &99u32).unwrap();
    store.add_item(&item).unwrap();
    store.flush().unwrap();

    let mut seen = 1;
    while iter.advance().unwrap() {
        seen += 1;
    }
    assert_eq!(seen, 7);
    assert_eq!(store.iter().unwrap().count(), 8);
}

// =============================================================================
// Filter Tests
// =============================================================================

#[test]
fn test_filter_yields_matching_keys_in_order() {
    let (_temp, store) = setup_mixed_store();
    assert_eq!(i32_keys(&store), vec![1, 2, 3]);
}

#[test]
fn test_filter_matches_unfiltered_relative_order() {
    let (_temp, store) = setup_mixed_store();

    let unfiltered: Vec<i32> = store
        .iter()
        .unwrap()
        .filter_map(|item| {
            let item = item.unwrap();
            match item.key_info() {
                (fragkv::Datatype::Int32, 4) => item.key::<i32>().ok(),
                _ => None,
            }
        })
        .collect();
    assert_eq!(unfiltered, i32_keys(&store));
}

#[test]
fn test_filter_skips_long_runs() {
    let (_temp, store) = setup_temp_store();
    for i in 0..2000u32 {
        let mut item = store.create_item(&i);
        item.set("n", &i).unwrap();
        store.add_item(&item).unwrap();
    }
    // Int64 sorts after every UInt32 key
    let mut last = store.create_item(&-1i64);
    last.set("n", &0u32).unwrap();
    store.add_item(&last).unwrap();
    store.flush().unwrap();

    let mut iter = store.iter().unwrap();
    iter.limit_key_type::<i64>();
    let keys: Vec<i64> = iter.map(|item| item.unwrap().key().unwrap()).collect();
    assert_eq!(keys, vec![-1]);
}

#[test]
fn test_filter_with_no_match() {
    let (_temp, store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    iter.limit_key_type::<f64>();
    assert!(!iter.advance().unwrap());
    assert!(iter.is_done());
    assert!(iter == store.end());
}

#[test]
fn test_all_keys_clears_filter() {
    let (_temp, store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    iter.limit_key_type::<i32>().all_keys();
    assert!(fragkv::MapIter::filter(&iter).is_none());
    assert_eq!(iter.count(), 7);
}

// =============================================================================
// Reset Tests
// =============================================================================

#[test]
fn test_reset_reproduces_filtered_sequence() {
    let (_temp, store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    iter.limit_key_type::<i32>();

    let mut first = Vec::new();
    while iter.advance().unwrap() {
        first.push(iter.current().unwrap().key::<i32>().unwrap());
    }
    assert!(iter.is_done());

    iter.reset().unwrap();
    let mut second = Vec::new();
    while iter.advance().unwrap() {
        second.push(iter.current().unwrap().key::<i32>().unwrap());
    }

    assert_eq!(first, vec![1, 2, 3]);
    assert_eq!(first, second);
}

// =============================================================================
// Equality Tests
// =============================================================================

#[test]
fn test_empty_store_iterators_are_equal() {
    let (_temp, store) = setup_temp_store();
    let a = store.iter().unwrap();
    let b = store.iter().unwrap();
    assert!(a.is_done());
    assert!(a == b);
    assert!(a == store.end());
}

#[test]
fn test_live_iterators_are_not_equal() {
    let (_temp, store) = setup_mixed_store();
    let mut a = store.iter().unwrap();
    let mut b = store.iter().unwrap();
    assert!(a.advance().unwrap());
    assert!(b.advance().unwrap());
    assert_eq!(
        a.current().unwrap().key_buffer(),
        b.current().unwrap().key_buffer()
    );
    assert!(a != b);
    assert!(a != store.end());
}

#[test]
fn test_exhausted_iterator_equals_end() {
    let (_temp, store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    while iter.advance().unwrap() {}
    assert!(iter == store.end());
    assert!(iter.next().is_none());
}

// =============================================================================
// Bound Item / Lifecycle Tests
// =============================================================================

#[test]
fn test_yielded_items_are_bound() {
    let (_temp, store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    iter.limit_key_type::<i32>();

    while iter.advance().unwrap() {
        let item = iter.current_mut().unwrap();
        let n = item.get::<u32>("n").unwrap();
        item.set("n", &(n * 100)).unwrap();
    }
    assert!(store.is_dirty().unwrap());
    store.flush().unwrap();

    assert_eq!(store.get_item(&2i32).unwrap().get::<u32>("n").unwrap(), 200);
    assert_eq!(store.get_item("a").unwrap().get::<u32>("n").unwrap(), 1);
}

#[test]
fn test_iterator_after_close_fails() {
    let (_temp, mut store) = setup_mixed_store();
    let mut iter = store.iter().unwrap();
    store.close().unwrap();

    assert!(matches!(iter.advance(), Err(MapError::UseAfterClose(_))));
    assert!(iter.is_done());
}
