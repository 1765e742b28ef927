//! Engine type tags
//!
//! Every key and attribute value is stored as raw little-endian bytes tagged
//! with a [`Datatype`] and, for attributes, a [`CellValNum`] element count.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Element type of a key or attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Datatype {
    Int8 = 0x01,
    UInt8 = 0x02,
    Int16 = 0x03,
    UInt16 = 0x04,
    Int32 = 0x05,
    UInt32 = 0x06,
    Int64 = 0x07,
    UInt64 = 0x08,
    Float32 = 0x09,
    Float64 = 0x0a,
    /// Text, one byte per element
    Char = 0x0b,
}

impl Datatype {
    /// All tags, in tag order
    pub const ALL: [Datatype; 11] = [
        Datatype::Int8,
        Datatype::UInt8,
        Datatype::Int16,
        Datatype::UInt16,
        Datatype::Int32,
        Datatype::UInt32,
        Datatype::Int64,
        Datatype::UInt64,
        Datatype::Float32,
        Datatype::Float64,
        Datatype::Char,
    ];

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            Datatype::Int8 | Datatype::UInt8 | Datatype::Char => 1,
            Datatype::Int16 | Datatype::UInt16 => 2,
            Datatype::Int32 | Datatype::UInt32 | Datatype::Float32 => 4,
            Datatype::Int64 | Datatype::UInt64 | Datatype::Float64 => 8,
        }
    }

    /// Lowercase name, as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            Datatype::Int8 => "int8",
            Datatype::UInt8 => "uint8",
            Datatype::Int16 => "int16",
            Datatype::UInt16 => "uint16",
            Datatype::Int32 => "int32",
            Datatype::UInt32 => "uint32",
            Datatype::Int64 => "int64",
            Datatype::UInt64 => "uint64",
            Datatype::Float32 => "float32",
            Datatype::Float64 => "float64",
            Datatype::Char => "char",
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Datatype {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Datatype::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .or(match lower.as_str() {
                "string" | "str" => Some(Datatype::Char),
                _ => None,
            })
            .ok_or_else(|| MapError::InvalidSchema(format!("unknown datatype '{}'", s)))
    }
}

/// Number of elements per value
///
/// `Var` is the variable-length sentinel: only the byte length decides how
/// many elements a value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellValNum {
    Fixed(u32),
    Var,
}

impl CellValNum {
    pub fn is_var(self) -> bool {
        matches!(self, CellValNum::Var)
    }

    /// Check that `len` bytes of `datatype` hold a whole number of elements
    /// and, for fixed counts, exactly the expected number.
    pub fn check(self, datatype: Datatype, len: usize) -> Result<()> {
        let size = datatype.size();
        let whole = len % size == 0;
        let fits = match self {
            CellValNum::Var => whole,
            CellValNum::Fixed(n) => whole && len / size == n as usize,
        };
        if fits {
            Ok(())
        } else {
            Err(MapError::SizeMismatch {
                datatype,
                expected: self,
                len,
            })
        }
    }
}

impl fmt::Display for CellValNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValNum::Fixed(n) => write!(f, "{} element(s)", n),
            CellValNum::Var => f.write_str("a variable number of elements"),
        }
    }
}
