//! Storage Module
//!
//! Durable layout of one map on the local filesystem.
//!
//! ## Responsibilities
//! - Persist the schema once, at create time
//! - Write each flush as one immutable fragment file (atomic rename)
//! - Merge fragments oldest → newest into a key-ordered view
//! - Consolidate all fragments into one
//!
//! ## Directory Layout
//! ```text
//! {uri}/
//!   ├── __schema.fkv
//!   └── __fragments/
//!         ├── frag_<nanos>_<pid>_<seq>.fkv
//!         └── ...
//! ```
//!
//! ## File Format (schema and fragments)
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic (4) | Version: u16 (2) | Count: u64 (8)         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [Len: u32][bincode entry]                             │
//! │   ... repeated Count times ...                          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                        │
//! │   DataCRC: u32                                          │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod format;
mod fragment;
mod manager;

pub use fragment::{FragmentMeta, FragmentReader, FragmentWriter};
pub use manager::FragmentManager;
pub(crate) use manager::merge_into;
