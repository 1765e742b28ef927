//! Error types for fragkv
//!
//! Provides a unified error type for codec, item, store and engine operations.

use thiserror::Error;

use crate::datatype::{CellValNum, Datatype};

/// Result type alias using MapError
pub type Result<T> = std::result::Result<T, MapError>;

/// Unified error type for fragkv operations
#[derive(Debug, Error)]
pub enum MapError {
    // -------------------------------------------------------------------------
    // Schema / Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Map already exists at {0}")]
    AlreadyExists(String),

    #[error("No map found at {0}")]
    NotFound(String),

    #[error("Store session {0} is closed")]
    UseAfterClose(u64),

    // -------------------------------------------------------------------------
    // Item / Attribute Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Attribute name must be given: {0}")]
    AttributeRequired(String),

    #[error("Item has no attribute values")]
    EmptyItem,

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: Datatype, actual: Datatype },

    #[error("Size mismatch: {len} bytes of {datatype} do not form {expected}")]
    SizeMismatch {
        datatype: Datatype,
        expected: CellValNum,
        len: usize,
    },

    #[error("Arity mismatch: {attributes} attributes, {values} tuple elements")]
    ArityMismatch { attributes: usize, values: usize },

    // -------------------------------------------------------------------------
    // Engine / Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Corrupted file: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for MapError {
    fn from(e: bincode::Error) -> Self {
        MapError::Serialization(e.to_string())
    }
}
