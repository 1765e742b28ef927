//! Map iteration
//!
//! [`MapIter`] walks the durable items of a store's snapshot in key order,
//! optionally skipping keys whose type does not match a [`KeyFilter`].
//!
//! ## States
//! ```text
//!   NotStarted ──next──▶ Positioned ──next──▶ ... ──▶ Exhausted
//!        ▲                                               │
//!        └──────────────────── reset ────────────────────┘
//! ```
//!
//! Equality is an end-of-iteration test: two iterators are equal only when
//! both are exhausted. Two live iterators never compare equal, even when
//! positioned on the same key.

use crate::codec::{Decode, TypedBuffer};
use crate::datatype::{CellValNum, Datatype};
use crate::engine::CursorId;
use crate::error::Result;
use crate::item::Item;
use crate::store::StoreHandle;

/// Key type filter: a datatype plus an element count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFilter {
    datatype: Datatype,
    cell_val_num: CellValNum,
}

impl KeyFilter {
    pub fn new(datatype: Datatype, cell_val_num: CellValNum) -> Self {
        Self {
            datatype,
            cell_val_num,
        }
    }

    /// Filter for keys decodable as `K`
    pub fn of<K: Decode>() -> Self {
        Self::new(K::DATATYPE, K::CELL_VAL_NUM)
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn cell_val_num(&self) -> CellValNum {
        self.cell_val_num
    }

    /// Whether `key` has this filter's datatype and element count
    /// (any count for `Var`)
    pub fn matches(&self, key: &TypedBuffer) -> bool {
        if key.datatype() != self.datatype {
            return false;
        }
        match self.cell_val_num {
            CellValNum::Var => true,
            CellValNum::Fixed(n) => key.element_count() == n as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    NotStarted,
    Positioned,
    Exhausted,
}

/// Forward, single-pass iterator over a store snapshot
///
/// Yields store-bound items: writing an attribute of a yielded item stages
/// it in the store, like any other bound item.
#[derive(Debug)]
pub struct MapIter {
    handle: Option<StoreHandle>,
    cursor: Option<CursorId>,
    state: IterState,
    current: Option<Item>,
    filter: Option<KeyFilter>,
}

impl MapIter {
    pub(crate) fn new(handle: StoreHandle, cursor: CursorId) -> Self {
        Self {
            handle: Some(handle),
            cursor: Some(cursor),
            state: IterState::NotStarted,
            current: None,
            filter: None,
        }
    }

    /// An iterator that is already exhausted
    pub fn end() -> Self {
        Self {
            handle: None,
            cursor: None,
            state: IterState::Exhausted,
            current: None,
            filter: None,
        }
    }

    // -------------------------------------------------------------------------
    // Filtering
    // -------------------------------------------------------------------------

    /// Only yield keys decodable as `K`
    pub fn limit_key_type<K: Decode>(&mut self) -> &mut Self {
        self.filter = Some(KeyFilter::of::<K>());
        self
    }

    /// Yield every key again
    pub fn all_keys(&mut self) -> &mut Self {
        self.filter = None;
        self
    }

    pub fn set_filter(&mut self, filter: Option<KeyFilter>) {
        self.filter = filter;
    }

    pub fn filter(&self) -> Option<KeyFilter> {
        self.filter
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Move to the next matching item. Returns false once exhausted.
    ///
    /// Any error also exhausts the iterator.
    pub fn advance(&mut self) -> Result<bool> {
        let result = self.step();
        if result.is_err() {
            self.state = IterState::Exhausted;
            self.current = None;
        }
        result
    }

    fn step(&mut self) -> Result<bool> {
        if self.state == IterState::Exhausted {
            return Ok(false);
        }
        let (Some(handle), Some(cursor)) = (&self.handle, self.cursor) else {
            self.state = IterState::Exhausted;
            return Ok(false);
        };

        let engine = handle.engine()?;
        let mut engine = engine.lock();

        if self.state == IterState::Positioned {
            engine.iter_next(cursor)?;
        }

        loop {
            if engine.iter_done(cursor)? {
                self.state = IterState::Exhausted;
                self.current = None;
                return Ok(false);
            }

            let record = engine.iter_here(cursor)?;
            if self.filter.map_or(true, |f| f.matches(&record.key)) {
                self.current = Some(Item::bound(record, handle.clone()));
                self.state = IterState::Positioned;
                return Ok(true);
            }

            tracing::trace!(
                cursor = %cursor,
                datatype = %record.key.datatype(),
                len = record.key.len(),
                "key filtered out"
            );
            engine.iter_next(cursor)?;
        }
    }

    /// The item the iterator is positioned on
    pub fn current(&self) -> Option<&Item> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Item> {
        self.current.as_mut()
    }

    /// Rewind to before the first item of the store's current snapshot,
    /// keeping the filter
    pub fn reset(&mut self) -> Result<()> {
        let (Some(handle), Some(cursor)) = (&self.handle, self.cursor) else {
            return Ok(());
        };
        handle.engine()?.lock().iter_reset(cursor)?;
        self.state = IterState::NotStarted;
        self.current = None;
        Ok(())
    }

    /// Whether the iterator has no further item
    ///
    /// An iterator that has not started yet counts as exhausted only when
    /// its snapshot holds no item at all; with a filter set, that is known
    /// after the first `advance`.
    pub fn is_done(&self) -> bool {
        match self.state {
            IterState::Exhausted => true,
            IterState::Positioned => false,
            IterState::NotStarted => self.snapshot_is_empty().unwrap_or(true),
        }
    }

    fn snapshot_is_empty(&self) -> Result<bool> {
        match (&self.handle, self.cursor) {
            (Some(handle), Some(cursor)) => handle.engine()?.lock().iter_done(cursor),
            _ => Ok(true),
        }
    }
}

impl Iterator for MapIter {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.clone().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl PartialEq for MapIter {
    fn eq(&self, other: &Self) -> bool {
        self.is_done() && other.is_done()
    }
}

impl Drop for MapIter {
    fn drop(&mut self) {
        if let (Some(handle), Some(cursor)) = (&self.handle, self.cursor) {
            if let Ok(engine) = handle.engine() {
                engine.lock().iter_free(cursor);
            }
        }
    }
}
