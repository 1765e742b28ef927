//! Write Buffer Module
//!
//! In-memory staging area for items added to a store session.
//!
//! ## Responsibilities
//! - Hold staged items until the next flush
//! - Keep at most one pending version per key (latest add wins)
//! - Count staged items for the auto-flush trigger
//! - Ordered iteration for fragment creation
//!
//! Staged items are invisible to lookups and iteration until flushed.

mod table;

pub use table::WriteBuffer;
