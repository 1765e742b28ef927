//! Attribute proxies
//!
//! Deferred views over one or several attributes of an [`Item`]. A proxy
//! borrows its item mutably for its whole lifetime. Writing through a proxy
//! stages the item exactly once, after all values are in place, when the
//! item is bound to a store (see [`AttributeProxy::registers`]).

use crate::codec::{encode, Decode, Encode};
use crate::error::{MapError, Result};

use super::Item;

/// Read/write view of one attribute
#[derive(Debug)]
pub struct AttributeProxy<'a> {
    attr: String,
    item: &'a mut Item,
}

impl<'a> AttributeProxy<'a> {
    pub(super) fn new(attr: String, item: &'a mut Item) -> Self {
        Self { attr, item }
    }

    pub fn name(&self) -> &str {
        &self.attr
    }

    /// Whether a `set` stages the item in a store
    pub fn registers(&self) -> bool {
        self.item.is_bound()
    }

    pub fn get<V: Decode>(&self) -> Result<V> {
        self.item.get(&self.attr)
    }

    pub fn set<V: Encode + ?Sized>(&mut self, value: &V) -> Result<()> {
        self.item.put(&self.attr, encode(value))?;
        self.item.stage()
    }
}

/// Read/write view of several attributes as one tuple
///
/// Arity is checked before anything is written. Writes are not atomic: if
/// the n-th value is rejected, values 0..n stay written to the item and the
/// item is not staged.
#[derive(Debug)]
pub struct MultiAttributeProxy<'a> {
    attrs: Vec<String>,
    item: &'a mut Item,
}

impl<'a> MultiAttributeProxy<'a> {
    pub(super) fn new(attrs: Vec<String>, item: &'a mut Item) -> Self {
        Self { attrs, item }
    }

    pub fn names(&self) -> &[String] {
        &self.attrs
    }

    pub fn registers(&self) -> bool {
        self.item.is_bound()
    }

    pub fn set<T: EncodeTuple>(&mut self, values: T) -> Result<()> {
        self.check_arity(T::ARITY)?;
        values.write_into(&self.attrs, self.item)?;
        self.item.stage()
    }

    pub fn get<T: DecodeTuple>(&self) -> Result<T> {
        self.check_arity(T::ARITY)?;
        T::read_from(&self.attrs, self.item)
    }

    fn check_arity(&self, values: usize) -> Result<()> {
        if self.attrs.len() != values {
            return Err(MapError::ArityMismatch {
                attributes: self.attrs.len(),
                values,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Tuple Support
// =============================================================================

/// A tuple whose elements are written to consecutive attributes
pub trait EncodeTuple {
    const ARITY: usize;

    /// Write element i to `attrs[i]`, in order, stopping at the first failure
    fn write_into(&self, attrs: &[String], item: &mut Item) -> Result<()>;
}

/// A tuple whose elements are read from consecutive attributes
pub trait DecodeTuple: Sized {
    const ARITY: usize;

    fn read_from(attrs: &[String], item: &Item) -> Result<Self>;
}

macro_rules! impl_tuple {
    ($arity:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: Encode + ?Sized),+> EncodeTuple for ($(&$name,)+) {
            const ARITY: usize = $arity;

            fn write_into(&self, attrs: &[String], item: &mut Item) -> Result<()> {
                $( item.put(&attrs[$idx], encode(self.$idx))?; )+
                Ok(())
            }
        }

        impl<$($name: Decode),+> DecodeTuple for ($($name,)+) {
            const ARITY: usize = $arity;

            fn read_from(attrs: &[String], item: &Item) -> Result<Self> {
                Ok(($( item.get::<$name>(&attrs[$idx])?, )+))
            }
        }
    };
}

impl_tuple!(1; A 0);
impl_tuple!(2; A 0, B 1);
impl_tuple!(3; A 0, B 1, C 2);
impl_tuple!(4; A 0, B 1, C 2, D 3);
impl_tuple!(5; A 0, B 1, C 2, D 3, E 4);
impl_tuple!(6; A 0, B 1, C 2, D 3, E 4, F 5);
