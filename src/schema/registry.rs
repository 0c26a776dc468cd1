//! Record schema registration against one connection

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::connection::SimConnection;
use crate::types::{DefineId, RecordSchema, RequestId};
use crate::{BridgeError, Result};

/// Registered schemas and the define ids the connection gave them.
///
/// Registration is keyed by schema name. Registering the identical schema
/// again returns the same id without calling the connection; registering a
/// different layout under a taken name is rejected, since the connection
/// would otherwise answer requests with the wrong layout.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_name: HashMap<String, (Arc<RecordSchema>, DefineId)>,
    by_request: HashMap<RequestId, Arc<RecordSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` with the connection once.
    pub async fn register<C>(&mut self, conn: &mut C, schema: Arc<RecordSchema>) -> Result<DefineId>
    where
        C: SimConnection + ?Sized,
    {
        if let Some((existing, id)) = self.by_name.get(schema.name()) {
            if **existing == *schema {
                debug!(schema = schema.name(), define_id = %id, "Schema already registered");
                return Ok(*id);
            }
            return Err(BridgeError::schema_error(format!(
                "'{}' is already registered with a different layout",
                schema.name()
            )));
        }

        let id = conn.register_schema(&schema).await?;

        let request_id = RequestId::from(id);
        if self.by_request.contains_key(&request_id) {
            return Err(BridgeError::schema_error(format!(
                "connection reused define id {} for '{}'",
                id,
                schema.name()
            )));
        }

        info!(
            schema = schema.name(),
            define_id = %id,
            fields = schema.field_count(),
            record_size = schema.record_size(),
            "Registered record schema"
        );

        self.by_request.insert(request_id, Arc::clone(&schema));
        self.by_name.insert(schema.name().to_string(), (schema, id));
        Ok(id)
    }

    /// Schema answering `request_id`, if any.
    pub fn lookup(&self, request_id: RequestId) -> Option<&Arc<RecordSchema>> {
        self.by_request.get(&request_id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
