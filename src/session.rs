//! Per-run state shared by the record handlers

use crate::aircraft::AircraftRegistry;
use crate::auth::AuthToken;

/// State owned by the dispatch task for the lifetime of one run.
///
/// Holds the validated bearer token and the aircraft id cache. Handlers get
/// it by `&mut`, so nothing here needs locking.
#[derive(Debug)]
pub struct Session {
    token: AuthToken,
    aircraft: AircraftRegistry,
}

impl Session {
    pub fn new(token: AuthToken) -> Self {
        Self { token, aircraft: AircraftRegistry::new() }
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    pub fn aircraft(&self) -> &AircraftRegistry {
        &self.aircraft
    }

    /// Token and aircraft cache, borrowed together for a resolve call.
    pub fn parts_mut(&mut self) -> (&AuthToken, &mut AircraftRegistry) {
        (&self.token, &mut self.aircraft)
    }
}
