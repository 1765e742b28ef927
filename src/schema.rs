//! Map schema
//!
//! The ordered set of named, typed attributes every item of a map may carry.
//! A schema is validated and persisted once, at create time, and is
//! immutable afterwards.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::codec::{Decode, TypedBuffer};
use crate::datatype::{CellValNum, Datatype};
use crate::error::{MapError, Result};

/// A named, typed value slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    datatype: Datatype,
    cell_val_num: CellValNum,
}

impl Attribute {
    pub fn new(name: impl Into<String>, datatype: Datatype, cell_val_num: CellValNum) -> Self {
        Self {
            name: name.into(),
            datatype,
            cell_val_num,
        }
    }

    /// Attribute holding values of the Rust type `T`
    pub fn of<T: Decode>(name: impl Into<String>) -> Self {
        Self::new(name, T::DATATYPE, T::CELL_VAL_NUM)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn cell_val_num(&self) -> CellValNum {
        self.cell_val_num
    }

    /// Check a value is storable under this attribute
    pub fn check_value(&self, value: &TypedBuffer) -> Result<()> {
        if value.datatype() != self.datatype {
            return Err(MapError::TypeMismatch {
                expected: self.datatype,
                actual: value.datatype(),
            });
        }
        self.cell_val_num.check(self.datatype, value.len())
    }
}

/// Schema of a map: its attributes, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapSchema {
    attributes: Vec<Attribute>,
}

impl MapSchema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// Create a new schema builder
    pub fn builder() -> MapSchemaBuilder {
        MapSchemaBuilder::default()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute_num(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// The single attribute, if the schema declares exactly one
    pub fn sole_attribute(&self) -> Option<&Attribute> {
        match self.attributes.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Validate: at least one attribute, non-empty unique names, and
    /// non-zero fixed element counts.
    pub fn check(&self) -> Result<()> {
        if self.attributes.is_empty() {
            return Err(MapError::InvalidSchema(
                "schema has no attributes".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for attr in &self.attributes {
            if attr.name.is_empty() {
                return Err(MapError::InvalidSchema(
                    "attribute name is empty".to_string(),
                ));
            }
            if !seen.insert(attr.name.as_str()) {
                return Err(MapError::InvalidSchema(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
            if attr.cell_val_num == CellValNum::Fixed(0) {
                return Err(MapError::InvalidSchema(format!(
                    "attribute '{}' has zero values per cell",
                    attr.name
                )));
            }
        }

        Ok(())
    }

    /// Resolve an attribute subset; an empty subset means all attributes.
    pub fn resolve_subset(&self, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(self.attributes.iter().map(|a| a.name.clone()).collect());
        }
        let mut subset = Vec::with_capacity(names.len());
        for name in names {
            if !self.has_attribute(name) {
                return Err(MapError::UnknownAttribute(name.clone()));
            }
            if !subset.contains(name) {
                subset.push(name.clone());
            }
        }
        Ok(subset)
    }
}

/// Builder for MapSchema
#[derive(Default)]
pub struct MapSchemaBuilder {
    attributes: Vec<Attribute>,
}

impl MapSchemaBuilder {
    /// Append an attribute
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn build(self) -> MapSchema {
        MapSchema::new(self.attributes)
    }
}
