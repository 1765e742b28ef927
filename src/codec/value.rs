//! Dynamic values
//!
//! For callers that only learn a value's type at runtime (the CLI, debugging
//! dumps): decode any buffer by its own tag, or parse text by a schema type.

use std::fmt;

use crate::datatype::{CellValNum, Datatype};
use crate::error::{MapError, Result};

use super::typed::{read_elements, write_elements, TypedBuffer};

/// A decoded value, one variant per datatype
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Char(String),
}

macro_rules! numeric {
    ($datatype:expr, $bind:ident => $body:expr, char => $char_body:expr) => {
        match $datatype {
            Datatype::Int8 => { type $bind = i8; $body }
            Datatype::UInt8 => { type $bind = u8; $body }
            Datatype::Int16 => { type $bind = i16; $body }
            Datatype::UInt16 => { type $bind = u16; $body }
            Datatype::Int32 => { type $bind = i32; $body }
            Datatype::UInt32 => { type $bind = u32; $body }
            Datatype::Int64 => { type $bind = i64; $body }
            Datatype::UInt64 => { type $bind = u64; $body }
            Datatype::Float32 => { type $bind = f32; $body }
            Datatype::Float64 => { type $bind = f64; $body }
            Datatype::Char => $char_body,
        }
    };
}

/// Wrap a typed element vector in the matching variant
trait IntoValue {
    fn into_value(self) -> Value;
}

macro_rules! impl_into_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl IntoValue for Vec<$t> {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

impl_into_value! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

impl Value {
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::Int8(_) => Datatype::Int8,
            Value::UInt8(_) => Datatype::UInt8,
            Value::Int16(_) => Datatype::Int16,
            Value::UInt16(_) => Datatype::UInt16,
            Value::Int32(_) => Datatype::Int32,
            Value::UInt32(_) => Datatype::UInt32,
            Value::Int64(_) => Datatype::Int64,
            Value::UInt64(_) => Datatype::UInt64,
            Value::Float32(_) => Datatype::Float32,
            Value::Float64(_) => Datatype::Float64,
            Value::Char(_) => Datatype::Char,
        }
    }

    /// Decode a buffer by its own tag
    pub fn from_buffer(buf: &TypedBuffer) -> Result<Value> {
        CellValNum::Var.check(buf.datatype(), buf.len())?;
        let bytes = buf.bytes();
        Ok(numeric!(buf.datatype(),
            T => read_elements::<T>(bytes).into_value(),
            char => Value::Char(String::from_utf8_lossy(bytes).into_owned())))
    }

    /// Parse text as a value of `datatype`
    ///
    /// Numbers are comma separated; char values take the text verbatim.
    pub fn parse(datatype: Datatype, text: &str) -> Result<Value> {
        Ok(numeric!(datatype,
            T => parse_list::<T>(datatype, text)?.into_value(),
            char => Value::Char(text.to_string())))
    }

    /// Encode with the given element count, checking the count fits
    pub fn to_buffer(&self, cell_val_num: CellValNum) -> Result<TypedBuffer> {
        let mut out = Vec::new();
        match self {
            Value::Int8(v) => write_elements(v, &mut out),
            Value::UInt8(v) => write_elements(v, &mut out),
            Value::Int16(v) => write_elements(v, &mut out),
            Value::UInt16(v) => write_elements(v, &mut out),
            Value::Int32(v) => write_elements(v, &mut out),
            Value::UInt32(v) => write_elements(v, &mut out),
            Value::Int64(v) => write_elements(v, &mut out),
            Value::UInt64(v) => write_elements(v, &mut out),
            Value::Float32(v) => write_elements(v, &mut out),
            Value::Float64(v) => write_elements(v, &mut out),
            Value::Char(s) => out.extend_from_slice(s.as_bytes()),
        }
        cell_val_num.check(self.datatype(), out.len())?;
        Ok(TypedBuffer::new(self.datatype(), cell_val_num, out))
    }
}

fn parse_list<T: std::str::FromStr>(datatype: Datatype, text: &str) -> Result<Vec<T>> {
    text.split(',')
        .map(|part| {
            part.trim().parse::<T>().map_err(|_| {
                MapError::Serialization(format!("cannot parse '{}' as {}", part.trim(), datatype))
            })
        })
        .collect()
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    if values.len() == 1 {
        return write!(f, "{}", values[0]);
    }
    f.write_str("[")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", v)?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int8(v) => write_list(f, v),
            Value::UInt8(v) => write_list(f, v),
            Value::Int16(v) => write_list(f, v),
            Value::UInt16(v) => write_list(f, v),
            Value::Int32(v) => write_list(f, v),
            Value::UInt32(v) => write_list(f, v),
            Value::Int64(v) => write_list(f, v),
            Value::UInt64(v) => write_list(f, v),
            Value::Float32(v) => write_list(f, v),
            Value::Float64(v) => write_list(f, v),
            Value::Char(s) => write!(f, "{:?}", s),
        }
    }
}
