//! Record schema types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::FieldType;

/// Handle the connection assigns to a registered data definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefineId(pub u32);

/// Correlates a data request with the messages answering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u32);

impl From<DefineId> for RequestId {
    /// Each schema is polled with a request id equal to its define id.
    fn from(id: DefineId) -> Self {
        RequestId(id.0)
    }
}

impl fmt::Display for DefineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One declared field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDef {
    /// Simulation variable name (e.g. "PLANE LATITUDE")
    pub name: String,
    /// Unit the simulator converts the value to; `None` for text fields
    pub unit: Option<String>,
    /// Wire type of the field
    pub data_type: FieldType,
    /// Byte offset within the record, assigned by [`RecordSchema::new`]
    pub offset: usize,
}

impl FieldDef {
    /// Declare a numeric field with its unit.
    pub fn new(name: impl Into<String>, unit: impl Into<String>, data_type: FieldType) -> Self {
        Self { name: name.into(), unit: Some(unit.into()), data_type, offset: 0 }
    }

    /// Declare a fixed-size text field (no unit).
    pub fn text(name: impl Into<String>, data_type: FieldType) -> Self {
        Self { name: name.into(), unit: None, data_type, offset: 0 }
    }
}

/// Ordered layout of one record type.
///
/// Offsets are computed from declaration order when the schema is built, so
/// the field list here is the single source of truth for both registration
/// and decoding. Reordering fields after registration would silently shift
/// every subsequent value; schemas are therefore immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldDef>,
    record_size: usize,
}

impl RecordSchema {
    /// Build and validate a schema.
    ///
    /// Rejects an empty name, an empty field list, empty field names,
    /// duplicate field names, and a unit on a text field.
    pub fn new(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDef>,
    ) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::BridgeError::schema_error("schema name is empty"));
        }

        let mut offset = 0;
        let mut seen = HashSet::new();
        let mut laid_out = Vec::new();

        for mut field in fields {
            if field.name.trim().is_empty() {
                return Err(crate::BridgeError::schema_error(format!(
                    "field {} of '{}' has an empty name",
                    laid_out.len(),
                    name
                )));
            }

            if !seen.insert(field.name.clone()) {
                return Err(crate::BridgeError::schema_error(format!(
                    "field '{}' declared twice in '{}'",
                    field.name, name
                )));
            }

            if field.data_type.is_text() && field.unit.is_some() {
                return Err(crate::BridgeError::schema_error(format!(
                    "text field '{}' cannot carry a unit",
                    field.name
                )));
            }

            field.offset = offset;
            offset += field.data_type.size();
            laid_out.push(field);
        }

        if laid_out.is_empty() {
            return Err(crate::BridgeError::schema_error(format!("'{}' has no fields", name)));
        }

        Ok(Self { name, fields: laid_out, record_size: offset })
    }

    /// Schema name, used as the registration key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Total bytes one record occupies on the wire.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Index of a field in declaration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Get the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}
