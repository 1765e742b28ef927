//! Store Module
//!
//! The opened handle to a map: buffered writes, flush lifecycle and lookups,
//! all delegated to the context's [`Engine`].
//!
//! ## Lifecycle
//! ```text
//!   create / open          reopen
//!  ───────────────▶ Open ◀────────┐
//!                    │  └─────────┘
//!             close  │
//!                    ▼
//!                 Closed ──── open_attributes ───▶ Open
//! ```
//!
//! ## Visibility
//! `has_key`, `get_item` and iteration read the durable state only. Items
//! staged by `add_item` (or by writing a bound item) show up after `flush`.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::codec::{encode, Encode, TypedBuffer};
use crate::config::Config;
use crate::engine::{Engine, FragmentEngine, SessionId, SharedEngine};
use crate::error::{MapError, Result};
use crate::item::{Item, ItemRecord};
use crate::iter::MapIter;
use crate::schema::{Attribute, MapSchema};

type EngineCell = Mutex<Box<dyn Engine + Send>>;

// =============================================================================
// Context
// =============================================================================

/// Shared engine and configuration for every store opened through it
#[derive(Clone)]
pub struct Context {
    config: Config,
    engine: SharedEngine,
}

impl Context {
    /// Context backed by the fragment-directory engine
    pub fn new(config: Config) -> Self {
        let engine = FragmentEngine::new(config.clone());
        Self::with_engine(config, engine)
    }

    /// Context backed by a custom engine
    pub fn with_engine<E: Engine + Send + 'static>(config: Config, engine: E) -> Self {
        let engine: Box<dyn Engine + Send> = Box::new(engine);
        Self {
            config,
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn engine(&self) -> &SharedEngine {
        &self.engine
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// StoreHandle
// =============================================================================

/// Non-owning reference from items and iterators to their store's session.
/// Every use goes through the engine, which rejects closed sessions.
#[derive(Clone)]
pub(crate) struct StoreHandle {
    engine: Weak<EngineCell>,
    session: SessionId,
    schema: Arc<MapSchema>,
    attributes: Arc<[String]>,
}

impl StoreHandle {
    /// The engine, or `UseAfterClose` once the context is gone
    pub(crate) fn engine(&self) -> Result<Arc<EngineCell>> {
        self.engine
            .upgrade()
            .ok_or(MapError::UseAfterClose(self.session.0))
    }

    pub(crate) fn session(&self) -> SessionId {
        self.session
    }

    pub(crate) fn schema(&self) -> &MapSchema {
        &self.schema
    }

    pub(crate) fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Stage a copy of `record` in the session's write buffer
    pub(crate) fn stage(&self, record: &ItemRecord) -> Result<()> {
        self.engine()?
            .lock()
            .add_item(self.session, record.clone())
    }

    /// Check `value` against the open attribute `attr`
    pub(crate) fn check_value(&self, attr: &str, value: &TypedBuffer) -> Result<()> {
        if !self.attributes.iter().any(|a| a == attr) {
            return Err(MapError::UnknownAttribute(attr.to_string()));
        }
        self.schema
            .attribute(attr)
            .ok_or_else(|| MapError::UnknownAttribute(attr.to_string()))?
            .check_value(value)
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("session", &self.session)
            .field("attributes", &self.attributes)
            .finish()
    }
}

// =============================================================================
// Store
// =============================================================================

/// An opened map
///
/// Single-threaded: share a `Store` across threads only behind your own
/// synchronization. Dropping an open store closes it (and so flushes it).
pub struct Store {
    ctx: Context,
    uri: String,
    handle: StoreHandle,
    is_open: bool,
}

impl Store {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Validate and persist `schema` at `uri`, then open the new map
    pub fn create(ctx: &Context, uri: &str, schema: &MapSchema) -> Result<Self> {
        schema.check()?;
        ctx.engine().lock().create(uri, schema)?;
        Self::open(ctx, uri)
    }

    /// Open an existing map with all attributes visible
    pub fn open(ctx: &Context, uri: &str) -> Result<Self> {
        Self::open_session(ctx, uri, Vec::new())
    }

    /// Open an existing map with only `attributes` visible
    pub fn open_with_attributes<S: AsRef<str>>(
        ctx: &Context,
        uri: &str,
        attributes: &[S],
    ) -> Result<Self> {
        Self::open_session(ctx, uri, to_names(attributes))
    }

    /// Re-open this handle, possibly on another attribute subset (empty =
    /// all). An open handle is closed first.
    pub fn open_attributes<S: AsRef<str>>(&mut self, attributes: &[S]) -> Result<()> {
        self.close()?;
        self.handle = connect(&self.ctx, &self.uri, &to_names(attributes))?;
        self.is_open = true;
        Ok(())
    }

    fn open_session(ctx: &Context, uri: &str, attributes: Vec<String>) -> Result<Self> {
        let handle = connect(ctx, uri, &attributes)?;
        Ok(Self {
            ctx: ctx.clone(),
            uri: uri.to_string(),
            handle,
            is_open: true,
        })
    }

    /// Refresh the schema and fragment snapshot; staged items are kept
    pub fn reopen(&mut self) -> Result<()> {
        self.ensure_open()?;
        let session = self.handle.session;
        let schema = {
            let mut engine = self.ctx.engine().lock();
            engine.reopen(session)?;
            engine.schema(session)?
        };
        self.handle.schema = Arc::new(schema);
        Ok(())
    }

    /// Flush, then release the session
    ///
    /// The store is closed afterwards even when the flush fails; the flush
    /// error is still returned. Closing a closed store does nothing.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;

        let session = self.handle.session;
        let mut engine = self.ctx.engine().lock();
        let flushed = engine.flush(session);
        let closed = engine.close(session);
        flushed.and(closed)
    }

    /// Merge all durable fragments of `uri` into one
    pub fn consolidate(ctx: &Context, uri: &str) -> Result<()> {
        ctx.engine().lock().consolidate(uri)
    }

    /// Create a single-attribute map named `attribute` from `pairs`, and
    /// flush it by closing
    pub fn create_from_pairs<K, V, I>(
        ctx: &Context,
        uri: &str,
        attribute: &str,
        pairs: I,
    ) -> Result<()>
    where
        K: Encode,
        V: Encode,
        I: IntoIterator<Item = (K, V)>,
    {
        let schema = MapSchema::builder()
            .attribute(Attribute::new(attribute, V::DATATYPE, V::CELL_VAL_NUM))
            .build();
        let mut store = Self::create(ctx, uri, &schema)?;

        for (key, value) in pairs {
            let mut item = Item::with_key(&key);
            item.set(attribute, &value)?;
            store.add_item(&item)?;
        }

        store.close()
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    /// A free item for `key`; it is stored only through `add_item`
    pub fn create_item<K: Encode + ?Sized>(&self, key: &K) -> Item {
        Item::with_key(key)
    }

    /// A bound item for `key` that has not been read; every attribute write
    /// stages it
    pub fn entry<K: Encode + ?Sized>(&self, key: &K) -> Result<Item> {
        self.ensure_open()?;
        Ok(Item::bound(ItemRecord::new(encode(key)), self.handle.clone()))
    }

    /// Whether `key` is durable in the current snapshot
    pub fn has_key<K: Encode + ?Sized>(&self, key: &K) -> Result<bool> {
        self.ensure_open()?;
        self.ctx
            .engine()
            .lock()
            .has_key(self.handle.session, &encode(key))
    }

    /// Look up a durable item; fails with `KeyNotFound` when absent
    pub fn get_item<K: Encode + ?Sized>(&self, key: &K) -> Result<Item> {
        self.get_item_by_buffer(&encode(key))
    }

    /// `get_item` for a key encoded at runtime
    pub fn get_item_by_buffer(&self, key: &TypedBuffer) -> Result<Item> {
        self.ensure_open()?;
        let record = self
            .ctx
            .engine()
            .lock()
            .get_item(self.handle.session, key)?;
        Ok(Item::bound(record, self.handle.clone()))
    }

    /// Stage `item`; may flush when the buffer reaches its bound
    pub fn add_item(&self, item: &Item) -> Result<()> {
        self.ensure_open()?;
        self.ctx
            .engine()
            .lock()
            .add_item(self.handle.session, item.record().clone())
    }

    // -------------------------------------------------------------------------
    // Buffering
    // -------------------------------------------------------------------------

    /// 0 means flush only on `flush()` or `close()`
    pub fn set_max_buffered_items(&self, max_items: u64) -> Result<()> {
        self.ensure_open()?;
        self.ctx
            .engine()
            .lock()
            .set_max_buffered(self.handle.session, max_items)
    }

    /// Make every staged item durable; on failure they all stay staged
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        self.ctx.engine().lock().flush(self.handle.session)
    }

    /// Whether staged items are waiting for a flush; always false once closed
    pub fn is_dirty(&self) -> Result<bool> {
        if !self.is_open {
            return Ok(false);
        }
        self.ctx.engine().lock().is_dirty(self.handle.session)
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    /// Forward iterator over the durable items of the current snapshot
    pub fn iter(&self) -> Result<MapIter> {
        self.ensure_open()?;
        let cursor = self.ctx.engine().lock().iter_alloc(self.handle.session)?;
        Ok(MapIter::new(self.handle.clone(), cursor))
    }

    /// An exhausted iterator, equal to any other exhausted iterator
    pub fn end(&self) -> MapIter {
        MapIter::end()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn schema(&self) -> &MapSchema {
        &self.handle.schema
    }

    /// Attribute names visible in this session
    pub fn attributes(&self) -> &[String] {
        &self.handle.attributes
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(MapError::UseAfterClose(self.handle.session.0))
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("uri", &self.uri)
            .field("session", &self.handle.session)
            .field("is_open", &self.is_open)
            .finish()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(uri = %self.uri, error = %e, "implicit close failed");
        }
    }
}

/// Open a session and describe it; the session is released again if the
/// description fails
fn connect(ctx: &Context, uri: &str, attributes: &[String]) -> Result<StoreHandle> {
    let mut engine = ctx.engine().lock();
    let session = engine.open(uri, attributes)?;

    let max_buffered = ctx.config().max_buffered_items;
    let described = describe(&mut **engine, session, max_buffered);

    match described {
        Ok((schema, names)) => Ok(StoreHandle {
            engine: Arc::downgrade(ctx.engine()),
            session,
            schema: Arc::new(schema),
            attributes: names.into(),
        }),
        Err(e) => {
            let _ = engine.close(session);
            Err(e)
        }
    }
}

fn describe(
    engine: &mut dyn Engine,
    session: SessionId,
    max_buffered: u64,
) -> Result<(MapSchema, Vec<String>)> {
    let schema = engine.schema(session)?;
    let names = engine.open_attributes(session)?;
    engine.set_max_buffered(session, max_buffered)?;
    Ok((schema, names))
}

fn to_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|n| n.as_ref().to_string()).collect()
}
