//! Engine Module
//!
//! The narrow storage-engine contract the store layer is built on, and the
//! fragment-directory engine that implements it.
//!
//! ## Handle Table
//! The engine owns every session and cursor. Callers hold only opaque
//! [`SessionId`] / [`CursorId`] values; any call naming a session that has
//! been closed (or a cursor whose session has been closed) fails with
//! `UseAfterClose`.

mod fragment_engine;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::TypedBuffer;
use crate::error::Result;
use crate::item::ItemRecord;
use crate::schema::MapSchema;

pub use fragment_engine::FragmentEngine;

/// Engine shared by a context and every store opened through it
pub type SharedEngine = Arc<Mutex<Box<dyn Engine + Send>>>;

/// Opaque handle of an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Opaque handle of an iteration cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// Storage engine primitives
///
/// Lookups and cursors read the session's durable snapshot only; items added
/// with `add_item` become visible to them after `flush`.
pub trait Engine {
    // -------------------------------------------------------------------------
    // Map lifecycle
    // -------------------------------------------------------------------------

    /// Persist a new map's schema at `uri`
    fn create(&mut self, uri: &str, schema: &MapSchema) -> Result<()>;

    /// Open a session over `attributes` (empty = all)
    fn open(&mut self, uri: &str, attributes: &[String]) -> Result<SessionId>;

    fn schema(&self, session: SessionId) -> Result<MapSchema>;

    /// Resolved attribute names visible in the session
    fn open_attributes(&self, session: SessionId) -> Result<Vec<String>>;

    /// Refresh the schema and fragment snapshot, keeping staged items
    fn reopen(&mut self, session: SessionId) -> Result<()>;

    /// Release the session and its cursors; staged items are discarded
    fn close(&mut self, session: SessionId) -> Result<()>;

    /// Merge all durable fragments of `uri` into one
    fn consolidate(&mut self, uri: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    fn has_key(&mut self, session: SessionId, key: &TypedBuffer) -> Result<bool>;

    /// Fails with `KeyNotFound` when absent
    fn get_item(&mut self, session: SessionId, key: &TypedBuffer) -> Result<ItemRecord>;

    // -------------------------------------------------------------------------
    // Buffered writes
    // -------------------------------------------------------------------------

    /// Stage an item; may flush when the buffer reaches its bound
    fn add_item(&mut self, session: SessionId, item: ItemRecord) -> Result<()>;

    /// 0 disables implicit flushing
    fn set_max_buffered(&mut self, session: SessionId, max_items: u64) -> Result<()>;

    /// Make every staged item durable; on failure all of them stay staged
    fn flush(&mut self, session: SessionId) -> Result<()>;

    fn is_dirty(&self, session: SessionId) -> Result<bool>;

    // -------------------------------------------------------------------------
    // Cursors
    // -------------------------------------------------------------------------

    fn iter_alloc(&mut self, session: SessionId) -> Result<CursorId>;

    fn iter_done(&self, cursor: CursorId) -> Result<bool>;

    fn iter_here(&self, cursor: CursorId) -> Result<ItemRecord>;

    fn iter_next(&mut self, cursor: CursorId) -> Result<()>;

    /// Rewind to the first item of the session's current snapshot
    fn iter_reset(&mut self, cursor: CursorId) -> Result<()>;

    fn iter_free(&mut self, cursor: CursorId);
}
