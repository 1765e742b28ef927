//! Item Module
//!
//! One key plus its named attribute values.
//!
//! An [`Item`] is either free (created from a key, tied to no store) or bound
//! (produced by a store lookup, iteration step or `Store::entry`). Every
//! mutation of a bound item stages the whole item in its store's write
//! buffer; free items are plain value containers until `Store::add_item`.

mod proxy;

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::{encode, Decode, Encode, TypedBuffer};
use crate::datatype::Datatype;
use crate::error::{MapError, Result};
use crate::store::StoreHandle;

pub use proxy::{AttributeProxy, DecodeTuple, EncodeTuple, MultiAttributeProxy};

// =============================================================================
// Engine-level Item Data
// =============================================================================

/// Identity of a key: its tag and raw bytes
///
/// Orders by tag, then bytes; this is the engine's iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId {
    datatype: Datatype,
    bytes: Bytes,
}

impl KeyId {
    pub fn of(key: &TypedBuffer) -> Self {
        Self {
            datatype: key.datatype(),
            bytes: key.bytes().clone(),
        }
    }
}

/// The data of an item as the engine stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub key: TypedBuffer,
    pub values: BTreeMap<String, TypedBuffer>,
}

impl ItemRecord {
    pub fn new(key: TypedBuffer) -> Self {
        Self {
            key,
            values: BTreeMap::new(),
        }
    }

    pub fn key_id(&self) -> KeyId {
        KeyId::of(&self.key)
    }

    /// Approximate size of key and values in bytes
    pub fn payload_size(&self) -> usize {
        self.key.len() + self.values.values().map(TypedBuffer::len).sum::<usize>()
    }

    /// Overlay a newer version of the same key, attribute by attribute
    pub fn merge(&mut self, newer: ItemRecord) {
        self.key = newer.key;
        self.values.extend(newer.values);
    }

    /// Copy keeping only the given attributes
    pub fn project(&self, attributes: &[String]) -> ItemRecord {
        ItemRecord {
            key: self.key.clone(),
            values: self
                .values
                .iter()
                .filter(|(name, _)| attributes.iter().any(|a| a == *name))
                .map(|(name, v)| (name.clone(), v.clone()))
                .collect(),
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// A key and its attribute values, optionally bound to a store
#[derive(Debug, Clone)]
pub struct Item {
    record: ItemRecord,
    owner: Option<StoreHandle>,
}

impl Item {
    /// A free item for `key`, with no attributes and no owning store
    pub fn with_key<K: Encode + ?Sized>(key: &K) -> Self {
        Self {
            record: ItemRecord::new(encode(key)),
            owner: None,
        }
    }

    /// A free item for an already encoded key
    pub fn from_key_buffer(key: TypedBuffer) -> Self {
        Self {
            record: ItemRecord::new(key),
            owner: None,
        }
    }

    pub(crate) fn bound(record: ItemRecord, owner: StoreHandle) -> Self {
        Self {
            record,
            owner: Some(owner),
        }
    }

    /// Whether attribute writes stage this item in a store
    pub fn is_bound(&self) -> bool {
        self.owner.is_some()
    }

    /// Drop the store binding, turning this into a free value container
    pub fn detach(&mut self) {
        self.owner = None;
    }

    /// True when the item holds a non-empty key
    pub fn is_valid(&self) -> bool {
        !self.record.key.is_empty()
    }

    // -------------------------------------------------------------------------
    // Key
    // -------------------------------------------------------------------------

    pub fn key<K: Decode>(&self) -> Result<K> {
        self.record.key.decode()
    }

    /// Key datatype and byte length
    pub fn key_info(&self) -> (Datatype, u64) {
        (self.record.key.datatype(), self.record.key.len() as u64)
    }

    pub fn key_buffer(&self) -> &TypedBuffer {
        &self.record.key
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    /// Set `attr` and, if bound, stage the item
    pub fn set<V: Encode + ?Sized>(&mut self, attr: &str, value: &V) -> Result<()> {
        self.put(attr, encode(value))?;
        self.stage()
    }

    /// Set `attr` from an already encoded buffer and, if bound, stage the item
    pub fn set_buffer(&mut self, attr: &str, value: TypedBuffer) -> Result<()> {
        self.put(attr, value)?;
        self.stage()
    }

    pub fn get<V: Decode>(&self, attr: &str) -> Result<V> {
        self.buffer(attr)?.decode()
    }

    /// The raw buffer stored under `attr`
    pub fn buffer(&self, attr: &str) -> Result<&TypedBuffer> {
        self.record
            .values
            .get(attr)
            .ok_or_else(|| MapError::UnknownAttribute(attr.to_string()))
    }

    /// Set the store's only attribute
    pub fn set_value<V: Encode + ?Sized>(&mut self, value: &V) -> Result<()> {
        let attr = self.sole_attribute()?;
        self.set(&attr, value)
    }

    /// Read the store's only attribute
    pub fn value<V: Decode>(&self) -> Result<V> {
        let attr = self.sole_attribute()?;
        self.get(&attr)
    }

    /// Names of the attributes holding a value, in name order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.record.values.keys().map(String::as_str)
    }

    /// Proxy over a single attribute
    pub fn attr(&mut self, name: impl Into<String>) -> AttributeProxy<'_> {
        AttributeProxy::new(name.into(), self)
    }

    /// Proxy over several attributes, read and written as a tuple
    pub fn attrs<S: AsRef<str>>(&mut self, names: &[S]) -> MultiAttributeProxy<'_> {
        let names = names.iter().map(|n| n.as_ref().to_string()).collect();
        MultiAttributeProxy::new(names, self)
    }

    pub fn record(&self) -> &ItemRecord {
        &self.record
    }

    // -------------------------------------------------------------------------
    // Internals shared with the proxies
    // -------------------------------------------------------------------------

    /// Store a value without staging. Bound items check it against the
    /// owner's open schema first.
    pub(crate) fn put(&mut self, attr: &str, value: TypedBuffer) -> Result<()> {
        if let Some(owner) = &self.owner {
            owner.check_value(attr, &value)?;
        }
        self.record.values.insert(attr.to_string(), value);
        Ok(())
    }

    /// Stage the whole item in the owner's write buffer; no-op when free
    pub(crate) fn stage(&self) -> Result<()> {
        match &self.owner {
            Some(owner) => owner.stage(&self.record),
            None => Ok(()),
        }
    }

    fn sole_attribute(&self) -> Result<String> {
        let owner = self.owner.as_ref().ok_or_else(|| {
            MapError::AttributeRequired("item is not bound to a map".to_string())
        })?;
        owner
            .schema()
            .sole_attribute()
            .map(|a| a.name().to_string())
            .ok_or_else(|| {
                MapError::AttributeRequired(format!(
                    "map has {} attributes",
                    owner.schema().attribute_num()
                ))
            })
    }
}
