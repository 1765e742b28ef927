//! WriteBuffer implementation
//!
//! BTreeMap keyed by item key, so flushed fragments come out sorted.

use std::collections::BTreeMap;

use crate::item::{ItemRecord, KeyId};

/// Staged, not yet durable items of one session
#[derive(Debug, Default)]
pub struct WriteBuffer {
    items: BTreeMap<KeyId, ItemRecord>,
    /// Approximate payload size in bytes (keys + values)
    size: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an item, replacing any staged item with the same key.
    /// Returns the number of staged items.
    pub fn stage(&mut self, record: ItemRecord) -> usize {
        let added = record.payload_size();
        if let Some(old) = self.items.insert(record.key_id(), record) {
            self.size -= old.payload_size();
        }
        self.size += added;
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Approximate payload size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, key: &KeyId) -> bool {
        self.items.contains_key(key)
    }

    /// Staged items in key order
    pub fn iter(&self) -> impl Iterator<Item = &ItemRecord> {
        self.items.values()
    }

    /// Drop everything (after a successful flush)
    pub fn clear(&mut self) {
        self.items.clear();
        self.size = 0;
    }
}
