//! Record schema registration.
//!
//! Schemas are declared as static field tables (see
//! [`TelemetryReport::schema`](crate::types::TelemetryReport::schema)) and
//! registered with the connection once at startup. The registry remembers
//! which request id answers to which schema so the dispatch loop can route
//! data messages back to their decoder.

mod registry;

pub use registry::SchemaRegistry;
