//! Aircraft name to id resolution

use std::collections::HashMap;
use tracing::{info, warn};

use crate::api::{AircraftId, IngestClient};
use crate::{BridgeError, Result};

/// Memoized aircraft registrations.
///
/// Each name hits the registration endpoint at most once per process.
/// Failures are cached too, so a name the service refused keeps failing
/// without further remote calls.
#[derive(Debug, Default)]
pub struct AircraftRegistry {
    entries: HashMap<String, Option<AircraftId>>,
}

impl AircraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, registering it on first use.
    pub async fn resolve(
        &mut self,
        api: &IngestClient,
        token: &str,
        name: &str,
    ) -> Result<AircraftId> {
        if let Some(entry) = self.entries.get(name) {
            return (*entry)
                .ok_or_else(|| BridgeError::AircraftUnresolved { name: name.to_string() });
        }

        let entry = match api.register_aircraft(token, name).await {
            Ok(id) if id.0 >= 0 => {
                info!(aircraft = name, aircraft_id = %id, "Aircraft resolved");
                Some(id)
            }
            Ok(id) => {
                warn!(aircraft = name, aircraft_id = %id, "Service returned a negative id");
                None
            }
            Err(e) => {
                warn!(aircraft = name, error = %e, "Aircraft registration failed");
                None
            }
        };

        self.entries.insert(name.to_string(), entry);
        entry.ok_or_else(|| BridgeError::AircraftUnresolved { name: name.to_string() })
    }

    /// Cached id, without a remote call.
    pub fn cached(&self, name: &str) -> Option<AircraftId> {
        self.entries.get(name).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
