//! Record decoding from raw simulator payloads.
//!
//! A `SimObjectData` message carries one record as a packed byte block laid
//! out exactly as its [`RecordSchema`] was registered. Decoding walks the
//! schema's fields in declaration order with a [`ByteCursor`], so every read
//! is bounds-checked and a short buffer is rejected instead of read past.
//!
//! Typed access goes through the [`FieldData`] trait, which checks the
//! declared [`FieldType`] before converting:
//!
//! ```rust
//! use skybridge::decode::{FieldData, RecordDecoder, encode_record};
//! use skybridge::types::{FieldDef, FieldType, RecordSchema, Value};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(RecordSchema::new(
//!     "Position",
//!     [
//!         FieldDef::text("TITLE", FieldType::String32),
//!         FieldDef::new("PLANE LATITUDE", "degrees", FieldType::Float64),
//!     ],
//! )
//! .unwrap());
//!
//! let bytes = encode_record(
//!     &schema,
//!     &[Value::Text("C172".into()), Value::Float64(50.4501)],
//! )
//! .unwrap();
//!
//! let record = RecordDecoder::decode(&bytes, &schema).unwrap();
//! let latitude: f64 = record.get("PLANE LATITUDE").unwrap();
//! assert_eq!(latitude, 50.4501);
//! ```

mod cursor;

pub use cursor::ByteCursor;

use std::sync::Arc;

use crate::types::{FieldType, RecordSchema, Value};
use crate::{BridgeError, Result};

/// One decoded record: values in schema order plus the schema they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub schema: Arc<RecordSchema>,
    pub values: Vec<Value>,
}

impl Record {
    /// Typed lookup by field name.
    pub fn get<T: FieldData>(&self, name: &str) -> Result<T> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| BridgeError::FieldNotFound { field: name.to_string() })?;
        T::from_value(&self.values[index], self.schema.fields()[index].data_type)
    }
}

/// Reconstructs records from payload buffers.
pub struct RecordDecoder;

impl RecordDecoder {
    /// Decode one record laid out according to `schema`.
    ///
    /// Bytes past `schema.record_size()` are ignored; the simulator pads some
    /// payloads to a multiple of four.
    pub fn decode(buffer: &[u8], schema: &Arc<RecordSchema>) -> Result<Record> {
        if buffer.len() < schema.record_size() {
            return Err(BridgeError::Buffer {
                offset: 0,
                needed: schema.record_size(),
                available: buffer.len(),
            });
        }

        let mut cursor = ByteCursor::new(buffer);
        let mut values = Vec::with_capacity(schema.field_count());

        for field in schema.fields() {
            debug_assert_eq!(cursor.position(), field.offset);
            let value = match field.data_type {
                FieldType::Int32 => Value::Int32(cursor.read_i32()?),
                FieldType::Int64 => Value::Int64(cursor.read_i64()?),
                FieldType::Float32 => Value::Float32(cursor.read_f32()?),
                FieldType::Float64 => Value::Float64(cursor.read_f64()?),
                text => Value::Text(cursor.read_fixed_str(text.size())?),
            };
            values.push(value);
        }

        Ok(Record { schema: Arc::clone(schema), values })
    }
}

/// Pack values into the wire layout of `schema`.
///
/// Used by the replay connection to synthesise payloads. Text longer than its
/// field is truncated so the terminating NUL always fits.
pub fn encode_record(schema: &RecordSchema, values: &[Value]) -> Result<Vec<u8>> {
    if values.len() != schema.field_count() {
        return Err(BridgeError::parse_error(
            format!("encoding '{}'", schema.name()),
            format!("expected {} values, got {}", schema.field_count(), values.len()),
        ));
    }

    let mut out = Vec::with_capacity(schema.record_size());
    for (field, value) in schema.fields().iter().zip(values) {
        match (field.data_type, value) {
            (FieldType::Int32, Value::Int32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (FieldType::Int64, Value::Int64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (FieldType::Float32, Value::Float32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (FieldType::Float64, Value::Float64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (text, Value::Text(s)) if text.is_text() => {
                let width = text.size();
                let bytes = s.as_bytes();
                let len = bytes.len().min(width - 1);
                out.extend_from_slice(&bytes[..len]);
                out.resize(out.len() + width - len, 0);
            }
            (expected, other) => {
                return Err(BridgeError::TypeConversion {
                    details: format!(
                        "field '{}' is {:?}, got value {:?}",
                        field.name, expected, other
                    ),
                });
            }
        }
    }

    Ok(out)
}

/// Types that can be read out of a decoded [`Value`].
pub trait FieldData: Sized {
    fn from_value(value: &Value, declared: FieldType) -> Result<Self>;
}

impl FieldData for f64 {
    fn from_value(value: &Value, declared: FieldType) -> Result<Self> {
        match value {
            Value::Float64(v) => Ok(*v),
            Value::Float32(v) => Ok(*v as f64),
            _ => Err(BridgeError::TypeConversion {
                details: format!("Expected Float64, got {:?}", declared),
            }),
        }
    }
}

impl FieldData for f32 {
    fn from_value(value: &Value, declared: FieldType) -> Result<Self> {
        match value {
            Value::Float32(v) => Ok(*v),
            _ => Err(BridgeError::TypeConversion {
                details: format!("Expected Float32, got {:?}", declared),
            }),
        }
    }
}

impl FieldData for i32 {
    fn from_value(value: &Value, declared: FieldType) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(*v),
            _ => Err(BridgeError::TypeConversion {
                details: format!("Expected Int32, got {:?}", declared),
            }),
        }
    }
}

impl FieldData for i64 {
    fn from_value(value: &Value, declared: FieldType) -> Result<Self> {
        match value {
            Value::Int64(v) => Ok(*v),
            Value::Int32(v) => Ok(*v as i64),
            _ => Err(BridgeError::TypeConversion {
                details: format!("Expected Int64, got {:?}", declared),
            }),
        }
    }
}

impl FieldData for String {
    fn from_value(value: &Value, declared: FieldType) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(BridgeError::TypeConversion {
                details: format!("Expected text, got {:?}", declared),
            }),
        }
    }
}
