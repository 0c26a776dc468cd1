//! Record field type definitions

use serde::{Deserialize, Serialize};

/// Fixed-width data types a record field can be declared with.
/// Maps to SimConnect's `SIMCONNECT_DATATYPE` enum (variable-length strings excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// NUL-padded text, 8 bytes
    String8,
    /// NUL-padded text, 32 bytes
    String32,
    /// NUL-padded text, 64 bytes
    String64,
    /// NUL-padded text, 128 bytes
    String128,
    /// NUL-padded text, 256 bytes
    String256,
    /// NUL-padded text, 260 bytes (MAX_PATH)
    String260,
}

impl FieldType {
    /// Returns the size in bytes of this data type.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int32 | FieldType::Float32 => 4,
            FieldType::Int64 | FieldType::Float64 => 8,
            FieldType::String8 => 8,
            FieldType::String32 => 32,
            FieldType::String64 => 64,
            FieldType::String128 => 128,
            FieldType::String256 => 256,
            FieldType::String260 => 260,
        }
    }

    /// Whether the field holds fixed-size text.
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            FieldType::String8
                | FieldType::String32
                | FieldType::String64
                | FieldType::String128
                | FieldType::String256
                | FieldType::String260
        )
    }

    /// Native `SIMCONNECT_DATATYPE` discriminant.
    pub const fn native_id(&self) -> u32 {
        match self {
            FieldType::Int32 => 1,
            FieldType::Int64 => 2,
            FieldType::Float32 => 3,
            FieldType::Float64 => 4,
            FieldType::String8 => 5,
            FieldType::String32 => 6,
            FieldType::String64 => 7,
            FieldType::String128 => 8,
            FieldType::String256 => 9,
            FieldType::String260 => 10,
        }
    }
}

/// Runtime value of one decoded field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
}
