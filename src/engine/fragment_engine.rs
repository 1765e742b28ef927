//! Fragment Engine
//!
//! Reference engine over a directory of immutable fragment files.
//!
//! ## Responsibilities
//! - Keep the session/cursor handle table
//! - Stage added items in a per-session write buffer
//! - Flush staged items as one new fragment (implicitly when the buffer
//!   reaches its bound)
//! - Serve lookups and cursors from the session's snapshot
//!
//! ## Snapshot Model
//! Opening a session loads every fragment present at that moment into an
//! in-memory view. The view then only changes when this session flushes
//! (its own fragment is merged in) or on `reopen` (the directory is
//! re-read). Cursors hold their own reference to the view they started on,
//! so a flush during iteration does not disturb them.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use crate::buffer::WriteBuffer;
use crate::codec::TypedBuffer;
use crate::config::Config;
use crate::datatype::CellValNum;
use crate::error::{MapError, Result};
use crate::item::{ItemRecord, KeyId};
use crate::schema::MapSchema;
use crate::storage::{merge_into, FragmentManager};

use super::{CursorId, Engine, SessionId};

type View = Arc<BTreeMap<KeyId, ItemRecord>>;

/// One open session over a map directory
struct Session {
    uri: String,
    manager: FragmentManager,
    schema: MapSchema,

    /// Attribute subset as requested at open (empty = all)
    requested: Vec<String>,

    /// Resolved attribute names visible in this session
    attributes: Vec<String>,

    /// Durable snapshot this session reads from
    view: View,

    /// Staged, not yet durable items
    buffer: WriteBuffer,

    /// Implicit flush bound (0 = never)
    max_buffered: u64,
}

impl Session {
    fn load(uri: &str, requested: &[String], max_buffered: u64) -> Result<Self> {
        let manager = FragmentManager::open(Path::new(uri))?;
        let mut session = Self {
            uri: uri.to_string(),
            manager,
            schema: MapSchema::default(),
            requested: requested.to_vec(),
            attributes: Vec::new(),
            view: Arc::new(BTreeMap::new()),
            buffer: WriteBuffer::new(),
            max_buffered,
        };
        session.refresh()?;
        Ok(session)
    }

    /// Reload schema and fragments from disk; the buffer is left alone
    fn refresh(&mut self) -> Result<()> {
        let schema = self.manager.load_schema()?;
        let attributes = schema.resolve_subset(&self.requested)?;
        let fragments = self.manager.list_fragments()?;
        let view = self.manager.load_view(&fragments)?;

        self.schema = schema;
        self.attributes = attributes;
        self.view = Arc::new(view);
        Ok(())
    }

    /// Check an item can be stored through this session
    fn validate(&self, record: &ItemRecord) -> Result<()> {
        let key = &record.key;
        if key.is_empty() {
            return Err(MapError::InvalidKey("key is empty".to_string()));
        }
        if CellValNum::Var.check(key.datatype(), key.len()).is_err() {
            return Err(MapError::InvalidKey(format!(
                "{} bytes is not a whole number of {} elements",
                key.len(),
                key.datatype()
            )));
        }
        if record.values.is_empty() {
            return Err(MapError::EmptyItem);
        }

        for (name, value) in &record.values {
            if !self.attributes.contains(name) {
                return Err(MapError::UnknownAttribute(name.clone()));
            }
            self.schema
                .attribute(name)
                .ok_or_else(|| MapError::UnknownAttribute(name.clone()))?
                .check_value(value)?;
        }

        Ok(())
    }

    /// Write the buffer as one fragment and merge it into the view.
    /// On failure nothing changes.
    fn flush(&mut self, sync: bool) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let staged_bytes = self.buffer.size();
        let meta = self.manager.write_fragment(self.buffer.iter(), sync)?;

        let view = Arc::make_mut(&mut self.view);
        for record in self.buffer.iter() {
            merge_into(view, record.clone());
        }
        self.buffer.clear();

        tracing::debug!(
            uri = %self.uri,
            items = meta.item_count,
            staged_bytes,
            bytes = meta.file_size,
            fragment = %meta.path.display(),
            "flushed write buffer"
        );
        Ok(())
    }

    fn lookup(&self, key: &TypedBuffer) -> Option<ItemRecord> {
        self.view
            .get(&KeyId::of(key))
            .map(|record| record.project(&self.attributes))
    }
}

/// Forward cursor over a session snapshot
struct Cursor {
    session: SessionId,
    view: View,
    attributes: Vec<String>,
    current: Option<KeyId>,
}

impl Cursor {
    fn first(view: &View) -> Option<KeyId> {
        view.keys().next().cloned()
    }
}

/// Engine over fragment directories on the local filesystem
///
/// ## Concurrency
/// The engine itself is single-threaded; a context shares it behind a
/// mutex, which serializes every primitive call. Several sessions may be
/// open on the same uri; each flush publishes a separate fragment and the
/// newest fragment wins per attribute.
pub struct FragmentEngine {
    config: Config,
    sessions: HashMap<SessionId, Session>,
    cursors: HashMap<CursorId, Cursor>,
    next_session: u64,
    next_cursor: u64,
}

impl FragmentEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            cursors: HashMap::new(),
            next_session: 1,
            next_cursor: 1,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live cursors
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    // =========================================================================
    // Handle Table
    // =========================================================================

    fn session(&self, id: SessionId) -> Result<&Session> {
        self.sessions.get(&id).ok_or(MapError::UseAfterClose(id.0))
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut Session> {
        self.sessions.get_mut(&id).ok_or(MapError::UseAfterClose(id.0))
    }

    fn cursor(&self, id: CursorId) -> Result<&Cursor> {
        self.cursors.get(&id).ok_or(MapError::UseAfterClose(id.0))
    }

    fn cursor_mut(&mut self, id: CursorId) -> Result<&mut Cursor> {
        self.cursors.get_mut(&id).ok_or(MapError::UseAfterClose(id.0))
    }
}

impl Default for FragmentEngine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine for FragmentEngine {
    fn create(&mut self, uri: &str, schema: &MapSchema) -> Result<()> {
        schema.check()?;
        FragmentManager::create(Path::new(uri), schema, self.config.sync_on_flush)?;
        tracing::info!(uri, attributes = schema.attribute_num(), "created map");
        Ok(())
    }

    fn open(&mut self, uri: &str, attributes: &[String]) -> Result<SessionId> {
        let session = Session::load(uri, attributes, self.config.max_buffered_items)?;
        let id = SessionId(self.next_session);
        self.next_session += 1;

        tracing::info!(
            uri,
            session = %id,
            items = session.view.len(),
            "opened map"
        );
        self.sessions.insert(id, session);
        Ok(id)
    }

    fn schema(&self, session: SessionId) -> Result<MapSchema> {
        Ok(self.session(session)?.schema.clone())
    }

    fn open_attributes(&self, session: SessionId) -> Result<Vec<String>> {
        Ok(self.session(session)?.attributes.clone())
    }

    fn reopen(&mut self, session: SessionId) -> Result<()> {
        let s = self.session_mut(session)?;
        s.refresh()?;
        tracing::debug!(
            uri = %s.uri,
            session = %session,
            items = s.view.len(),
            staged = s.buffer.len(),
            "reopened map"
        );
        Ok(())
    }

    fn close(&mut self, session: SessionId) -> Result<()> {
        let s = self
            .sessions
            .remove(&session)
            .ok_or(MapError::UseAfterClose(session.0))?;
        self.cursors.retain(|_, c| c.session != session);

        if !s.buffer.is_empty() {
            tracing::warn!(
                uri = %s.uri,
                session = %session,
                staged = s.buffer.len(),
                "closing session with unflushed items"
            );
        }
        tracing::info!(uri = %s.uri, session = %session, "closed map");
        Ok(())
    }

    fn consolidate(&mut self, uri: &str) -> Result<()> {
        let manager = FragmentManager::open(Path::new(uri))?;
        match manager.consolidate(self.config.sync_on_flush)? {
            Some(meta) => tracing::info!(
                uri,
                items = meta.item_count,
                fragment = %meta.path.display(),
                "consolidated fragments"
            ),
            None => tracing::debug!(uri, "nothing to consolidate"),
        }
        Ok(())
    }

    fn has_key(&mut self, session: SessionId, key: &TypedBuffer) -> Result<bool> {
        Ok(self.session(session)?.view.contains_key(&KeyId::of(key)))
    }

    fn get_item(&mut self, session: SessionId, key: &TypedBuffer) -> Result<ItemRecord> {
        self.session(session)?
            .lookup(key)
            .ok_or(MapError::KeyNotFound)
    }

    fn add_item(&mut self, session: SessionId, item: ItemRecord) -> Result<()> {
        let sync = self.config.sync_on_flush;
        let s = self.session_mut(session)?;
        s.validate(&item)?;

        if s.buffer.contains(&item.key_id()) {
            tracing::trace!(uri = %s.uri, "replacing staged item");
        }
        let staged = s.buffer.stage(item) as u64;
        if s.max_buffered > 0 && staged >= s.max_buffered {
            tracing::debug!(uri = %s.uri, staged, "write buffer full, flushing");
            s.flush(sync)?;
        }
        Ok(())
    }

    fn set_max_buffered(&mut self, session: SessionId, max_items: u64) -> Result<()> {
        self.session_mut(session)?.max_buffered = max_items;
        Ok(())
    }

    fn flush(&mut self, session: SessionId) -> Result<()> {
        let sync = self.config.sync_on_flush;
        self.session_mut(session)?.flush(sync)
    }

    fn is_dirty(&self, session: SessionId) -> Result<bool> {
        Ok(!self.session(session)?.buffer.is_empty())
    }

    fn iter_alloc(&mut self, session: SessionId) -> Result<CursorId> {
        let s = self.session(session)?;
        let cursor = Cursor {
            session,
            view: Arc::clone(&s.view),
            attributes: s.attributes.clone(),
            current: Cursor::first(&s.view),
        };

        let id = CursorId(self.next_cursor);
        self.next_cursor += 1;
        self.cursors.insert(id, cursor);
        Ok(id)
    }

    fn iter_done(&self, cursor: CursorId) -> Result<bool> {
        Ok(self.cursor(cursor)?.current.is_none())
    }

    fn iter_here(&self, cursor: CursorId) -> Result<ItemRecord> {
        let c = self.cursor(cursor)?;
        c.current
            .as_ref()
            .and_then(|key| c.view.get(key))
            .map(|record| record.project(&c.attributes))
            .ok_or_else(|| MapError::Engine(format!("{} is exhausted", cursor)))
    }

    fn iter_next(&mut self, cursor: CursorId) -> Result<()> {
        let c = self.cursor_mut(cursor)?;
        if let Some(current) = c.current.take() {
            c.current = c
                .view
                .range((Bound::Excluded(current), Bound::Unbounded))
                .next()
                .map(|(key, _)| key.clone());
        }
        Ok(())
    }

    fn iter_reset(&mut self, cursor: CursorId) -> Result<()> {
        let session = self.cursor(cursor)?.session;
        let (view, attributes) = {
            let s = self.session(session)?;
            (Arc::clone(&s.view), s.attributes.clone())
        };

        let c = self.cursor_mut(cursor)?;
        c.current = Cursor::first(&view);
        c.view = view;
        c.attributes = attributes;
        Ok(())
    }

    fn iter_free(&mut self, cursor: CursorId) {
        self.cursors.remove(&cursor);
    }
}
