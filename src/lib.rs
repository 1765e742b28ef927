//! # fragkv
//!
//! A buffered, typed key-value map over an append-only fragment engine:
//! - Typed keys and attribute values packed into tagged byte buffers
//! - Per-key items with one or more named attributes
//! - A bounded write buffer with explicit and implicit flush
//! - Lookups and forward, type-filtered iteration over durable state
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Item / AttributeProxy / MapIter                 │
//! │          (typed values via the Encode/Decode codec)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ stage / lookup / cursor
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store                                 │
//! │        (open/close lifecycle, flush, dirty tracking)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ SessionId / CursorId
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Engine (handle table)                        │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │  Write Buffer   │ ──── flush ──▶ │    Fragments    │
//!   │   (per session) │                │  (immutable)    │
//!   └─────────────────┘                └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use fragkv::{Attribute, Context, MapSchema, Store};
//!
//! # fn main() -> fragkv::Result<()> {
//! let ctx = Context::default();
//! let schema = MapSchema::builder()
//!     .attribute(Attribute::of::<i32>("a"))
//!     .attribute(Attribute::of::<String>("b"))
//!     .build();
//!
//! let mut store = Store::create(&ctx, "/tmp/my_map", &schema)?;
//! let mut item = store.create_item(&1i32);
//! item.set("a", &5i32)?;
//! item.set("b", "x")?;
//! store.add_item(&item)?;
//! store.flush()?;
//!
//! assert_eq!(store.get_item(&1i32)?.get::<i32>("a")?, 5);
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod datatype;
pub mod codec;
pub mod schema;
pub mod item;
pub mod buffer;
pub mod storage;
pub mod engine;
pub mod store;
pub mod iter;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MapError, Result};
pub use config::Config;
pub use datatype::{CellValNum, Datatype};
pub use codec::{decode, encode, Decode, Encode, TypedBuffer, Value};
pub use schema::{Attribute, MapSchema};
pub use item::{AttributeProxy, Item, ItemRecord, MultiAttributeProxy};
pub use engine::{Engine, FragmentEngine};
pub use store::{Context, Store};
pub use iter::{KeyFilter, MapIter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of fragkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
