//! Codec Module
//!
//! Converts typed values to and from tagged byte buffers.
//!
//! ## Responsibilities
//! - Encode Rust values into a [`TypedBuffer`] (datatype, element count, bytes)
//! - Decode buffers back, rejecting mismatched tags and element counts
//! - Dynamic decoding/parsing for callers that only know the schema at runtime
//!
//! ## Shapes
//! ```text
//! ┌──────────────────┬──────────────┬───────────────────────────┐
//! │ Rust type        │ Element count│ Bytes                     │
//! ├──────────────────┼──────────────┼───────────────────────────┤
//! │ i32, f64, ...    │ Fixed(1)     │ one little-endian element │
//! │ [T; N]           │ Fixed(N)     │ N elements                │
//! │ Vec<T>           │ Var          │ len elements              │
//! │ String / &str    │ Var (char)   │ UTF-8 bytes               │
//! └──────────────────┴──────────────┴───────────────────────────┘
//! ```

mod typed;
mod value;

pub use typed::{decode, encode, Decode, Encode, Scalar, TypedBuffer};
pub use value::Value;
