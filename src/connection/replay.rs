//! Replay connection backed by a recorded flight
//!
//! A recording is a YAML document listing aircraft snapshots. The connection
//! behaves like the simulator from the dispatch loop's point of view: it
//! acknowledges the open, assigns define ids, and answers each single-shot
//! data request with one `SimObjectData` frame in the native wire layout.

use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{DispatchStatus, E_FAIL, NextDispatch, S_OK, SimConnection, SimObjectType};
use crate::decode::encode_record;
use crate::types::{
    DefineId, DispatchMessage, OpenInfo, RecordSchema, RequestId, SimObjectData, TelemetryReport,
};
use crate::{BridgeError, Result};

/// `SIMCONNECT_EXCEPTION_SIZE_MISMATCH`
const EXCEPTION_SIZE_MISMATCH: u32 = 2;
/// `SIMCONNECT_EXCEPTION_UNRECOGNIZED_ID`
const EXCEPTION_UNRECOGNIZED_ID: u32 = 3;
/// Object id the simulator uses for the user aircraft.
const USER_OBJECT_ID: u32 = 1;

/// Status reported once the recording has run out (`E_ABORT`).
const E_ABORT: i32 = 0x8000_4004_u32 as i32;

/// On-disk recording format.
#[derive(Debug, Clone, Deserialize)]
pub struct Recording {
    /// Name reported in the open acknowledgement
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// Start over instead of ending the connection after the last snapshot
    #[serde(default)]
    pub loop_recording: bool,
    /// Event ids delivered right after the open acknowledgement
    #[serde(default)]
    pub events: Vec<u32>,
    /// Snapshots in delivery order
    pub snapshots: Vec<TelemetryReport>,
}

fn default_application_name() -> String {
    "Replay".to_string()
}

impl Recording {
    /// Parse a YAML recording.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| BridgeError::parse_error("replay recording", e.to_string()))
    }
}

/// Connection that plays back a [`Recording`].
pub struct ReplayConnection {
    recording: Recording,
    schemas: Vec<Arc<RecordSchema>>,
    queue: VecDeque<Vec<u8>>,
    cursor: usize,
    exhausted: bool,
    closed: bool,
}

impl ReplayConnection {
    /// Open a recording file.
    pub fn open<P: AsRef<Path>>(path: P, app_name: &str) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::connection_failed_with_source(
                format!("cannot read recording {}", path.display()),
                Box::new(e),
            )
        })?;

        let recording = Recording::from_yaml(&yaml)?;
        info!(
            path = %path.display(),
            snapshots = recording.snapshots.len(),
            "Opened replay recording"
        );
        Self::connect(recording, app_name)
    }

    /// Connect to an in-memory recording.
    pub fn connect(recording: Recording, app_name: &str) -> Result<Self> {
        if recording.snapshots.is_empty() {
            return Err(BridgeError::connection_failed("recording holds no snapshots"));
        }

        let mut queue = VecDeque::new();
        queue.push_back(
            DispatchMessage::Open(OpenInfo {
                application_name: recording.application_name.clone(),
                application_version: (1, 0),
                application_build: (0, 0),
                simconnect_version: (11, 0),
                simconnect_build: (0, 0),
            })
            .encode(),
        );
        for event_id in &recording.events {
            queue.push_back(
                DispatchMessage::Event { group_id: 0, event_id: *event_id, data: 0 }.encode(),
            );
        }

        debug!(app_name, "Replay connection opened");

        Ok(Self {
            recording,
            schemas: Vec::new(),
            queue,
            cursor: 0,
            exhausted: false,
            closed: false,
        })
    }

    fn next_snapshot(&mut self) -> Option<TelemetryReport> {
        if self.cursor >= self.recording.snapshots.len() {
            if !self.recording.loop_recording {
                return None;
            }
            debug!("Replay recording restarted");
            self.cursor = 0;
        }

        let snapshot = self.recording.snapshots[self.cursor].clone();
        self.cursor += 1;
        Some(snapshot)
    }

    fn exception(&mut self, code: u32, send_id: u32) {
        self.queue.push_back(DispatchMessage::Exception { code, send_id, index: 0 }.encode());
    }

    fn status(&self) -> i32 {
        if !self.queue.is_empty() {
            S_OK
        } else if self.exhausted || self.closed {
            E_ABORT
        } else {
            E_FAIL
        }
    }
}

#[async_trait::async_trait]
impl SimConnection for ReplayConnection {
    async fn register_schema(&mut self, schema: &RecordSchema) -> Result<DefineId> {
        self.schemas.push(Arc::new(schema.clone()));
        let id = DefineId(self.schemas.len() as u32);
        debug!(define_id = %id, schema = schema.name(), "Replay registered schema");
        Ok(id)
    }

    async fn request_data(
        &mut self,
        request_id: RequestId,
        define_id: DefineId,
        _target: SimObjectType,
    ) -> Result<()> {
        if self.closed {
            return Err(BridgeError::connection_failed("replay connection is closed"));
        }

        let Some(schema) = (define_id.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.schemas.get(index))
            .cloned()
        else {
            self.exception(EXCEPTION_UNRECOGNIZED_ID, request_id.0);
            return Ok(());
        };

        let Some(snapshot) = self.next_snapshot() else {
            debug!("Replay recording exhausted");
            self.exhausted = true;
            return Ok(());
        };

        match encode_record(&schema, &snapshot.to_values()) {
            Ok(payload) => {
                let frame = DispatchMessage::SimObjectData(SimObjectData {
                    request_id,
                    object_id: USER_OBJECT_ID,
                    define_id,
                    flags: 0,
                    entry_number: 1,
                    out_of: 1,
                    define_count: schema.field_count() as u32,
                    payload,
                });
                self.queue.push_back(frame.encode());
            }
            Err(e) => {
                debug!(error = %e, "Recording cannot fill schema");
                self.exception(EXCEPTION_SIZE_MISMATCH, request_id.0);
            }
        }

        Ok(())
    }

    async fn next_message(&mut self) -> Result<NextDispatch> {
        let status = DispatchStatus::from_hresult(self.status());
        match self.queue.pop_front() {
            Some(frame) => status.into_next(|| frame),
            None => status.into_next(Vec::new),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.queue.clear();
        info!(delivered = self.cursor, "Replay connection closed");
        Ok(())
    }
}
