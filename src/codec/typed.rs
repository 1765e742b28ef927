//! Typed buffers and the static encode/decode traits.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::datatype::{CellValNum, Datatype};
use crate::error::{MapError, Result};

/// An untyped byte buffer tagged with its element type and count
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedBuffer {
    datatype: Datatype,
    cell_val_num: CellValNum,
    bytes: Bytes,
}

impl TypedBuffer {
    pub fn new(datatype: Datatype, cell_val_num: CellValNum, bytes: impl Into<Bytes>) -> Self {
        Self {
            datatype,
            cell_val_num,
            bytes: bytes.into(),
        }
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn cell_val_num(&self) -> CellValNum {
        self.cell_val_num
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Byte length of the encoded value
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole elements held in the buffer
    pub fn element_count(&self) -> usize {
        self.bytes.len() / self.datatype.size()
    }

    /// Decode into `T`, see [`decode`]
    pub fn decode<T: Decode>(&self) -> Result<T> {
        decode(self)
    }
}

// =============================================================================
// Element Types
// =============================================================================

/// A fixed-width element type with a little-endian byte representation
pub trait Scalar: Copy {
    const DATATYPE: Datatype;

    fn write_le(self, out: &mut Vec<u8>);

    /// `chunk` is exactly one element wide
    fn read_le(chunk: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty => $tag:ident),* $(,)?) => {
        $(
            impl Scalar for $t {
                const DATATYPE: Datatype = Datatype::$tag;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(chunk: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(chunk);
                    <$t>::from_le_bytes(raw)
                }
            }

            impl Encode for $t {
                const DATATYPE: Datatype = Datatype::$tag;
                const CELL_VAL_NUM: CellValNum = CellValNum::Fixed(1);

                fn encode_into(&self, out: &mut Vec<u8>) {
                    self.write_le(out);
                }
            }

            impl Decode for $t {
                const DATATYPE: Datatype = Datatype::$tag;
                const CELL_VAL_NUM: CellValNum = CellValNum::Fixed(1);

                fn decode_checked(bytes: &[u8]) -> Result<Self> {
                    Ok(<$t as Scalar>::read_le(bytes))
                }
            }
        )*
    };
}

impl_scalar! {
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

/// Split `bytes` into elements of `T`; the caller has checked the length.
pub(crate) fn read_elements<T: Scalar>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::DATATYPE.size())
        .map(T::read_le)
        .collect()
}

pub(crate) fn write_elements<T: Scalar>(values: &[T], out: &mut Vec<u8>) {
    out.reserve(values.len() * T::DATATYPE.size());
    for v in values {
        v.write_le(out);
    }
}

// =============================================================================
// Encode / Decode
// =============================================================================

/// A value that can be written as a key or attribute value
pub trait Encode {
    const DATATYPE: Datatype;
    const CELL_VAL_NUM: CellValNum;

    fn encode_into(&self, out: &mut Vec<u8>);
}

/// A value that can be read back from a [`TypedBuffer`]
pub trait Decode: Sized {
    const DATATYPE: Datatype;
    const CELL_VAL_NUM: CellValNum;

    /// Build the value from bytes whose tag and length were already checked
    fn decode_checked(bytes: &[u8]) -> Result<Self>;
}

impl<T: Scalar> Encode for Vec<T> {
    const DATATYPE: Datatype = T::DATATYPE;
    const CELL_VAL_NUM: CellValNum = CellValNum::Var;

    fn encode_into(&self, out: &mut Vec<u8>) {
        write_elements(self, out);
    }
}

impl<T: Scalar> Decode for Vec<T> {
    const DATATYPE: Datatype = T::DATATYPE;
    const CELL_VAL_NUM: CellValNum = CellValNum::Var;

    fn decode_checked(bytes: &[u8]) -> Result<Self> {
        Ok(read_elements(bytes))
    }
}

impl<T: Scalar, const N: usize> Encode for [T; N] {
    const DATATYPE: Datatype = T::DATATYPE;
    const CELL_VAL_NUM: CellValNum = CellValNum::Fixed(N as u32);

    fn encode_into(&self, out: &mut Vec<u8>) {
        write_elements(self, out);
    }
}

impl<T: Scalar, const N: usize> Decode for [T; N] {
    const DATATYPE: Datatype = T::DATATYPE;
    const CELL_VAL_NUM: CellValNum = CellValNum::Fixed(N as u32);

    fn decode_checked(bytes: &[u8]) -> Result<Self> {
        let len = bytes.len();
        read_elements::<T>(bytes)
            .try_into()
            .map_err(|_| MapError::SizeMismatch {
                datatype: T::DATATYPE,
                expected: CellValNum::Fixed(N as u32),
                len,
            })
    }
}

impl Encode for str {
    const DATATYPE: Datatype = Datatype::Char;
    const CELL_VAL_NUM: CellValNum = CellValNum::Var;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl Encode for String {
    const DATATYPE: Datatype = Datatype::Char;
    const CELL_VAL_NUM: CellValNum = CellValNum::Var;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl Decode for String {
    const DATATYPE: Datatype = Datatype::Char;
    const CELL_VAL_NUM: CellValNum = CellValNum::Var;

    fn decode_checked(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| MapError::Serialization(format!("char value is not UTF-8: {}", e)))
    }
}

/// Encode a value into a tagged buffer
pub fn encode<T: Encode + ?Sized>(value: &T) -> TypedBuffer {
    let mut out = Vec::new();
    value.encode_into(&mut out);
    TypedBuffer::new(T::DATATYPE, T::CELL_VAL_NUM, out)
}

/// Decode a tagged buffer into `T`
///
/// Fails with `TypeMismatch` when the stored tag differs from `T`'s, and with
/// `SizeMismatch` when the byte length does not hold `T`'s element count.
/// Bytes are never reinterpreted under a different tag.
pub fn decode<T: Decode>(buf: &TypedBuffer) -> Result<T> {
    if buf.datatype() != T::DATATYPE {
        return Err(MapError::TypeMismatch {
            expected: T::DATATYPE,
            actual: buf.datatype(),
        });
    }
    T::CELL_VAL_NUM.check(buf.datatype(), buf.len())?;
    T::decode_checked(buf.bytes())
}
