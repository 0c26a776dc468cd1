//! Core types for simulator data representation.
//!
//! ## Architecture
//!
//! The type system maps directly to SimConnect structures:
//! - [`RecordSchema`] declares the ordered field layout of one data definition
//! - [`FieldType`] maps to `SIMCONNECT_DATATYPE` with size information
//! - [`DefineId`] / [`RequestId`] correlate a schema with requests and replies
//! - [`DispatchMessage`] is one variant message from the connection
//! - [`TelemetryReport`] is the decoded aircraft snapshot the bridge forwards
//!
//! ## Usage Example
//!
//! ```rust
//! use skybridge::types::{FieldDef, FieldType, RecordSchema};
//!
//! let schema = RecordSchema::new(
//!     "Heading",
//!     [
//!         FieldDef::text("TITLE", FieldType::String256),
//!         FieldDef::new("PLANE HEADING DEGREES TRUE", "degrees", FieldType::Float64),
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!(schema.record_size(), 264);
//! assert_eq!(schema.get_field("PLANE HEADING DEGREES TRUE").unwrap().offset, 256);
//! ```

mod field_type;
mod message;
mod report;
mod schema;

pub use field_type::{FieldType, Value};
pub use message::{DispatchMessage, MessageKind, OpenInfo, RECV_HEADER_SIZE, SimObjectData};
pub use report::TelemetryReport;
pub use schema::{DefineId, FieldDef, RecordSchema, RequestId};
