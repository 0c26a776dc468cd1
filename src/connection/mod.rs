//! Simulator connection seam.
//!
//! The native interop layer (opening the pipe, registering data definitions,
//! pulling dispatch frames) sits behind [`SimConnection`]. The dispatch loop
//! only ever talks to this trait, so a recorded flight can stand in for the
//! simulator via [`replay::ReplayConnection`].

pub mod replay;

use crate::types::{DefineId, RecordSchema, RequestId};
use crate::{BridgeError, Result};

/// `S_OK`
pub(crate) const S_OK: i32 = 0;
/// `E_FAIL`, which `SimConnect_GetNextDispatch` returns when the queue is empty
pub(crate) const E_FAIL: i32 = 0x8000_4005_u32 as i32;

/// Which simulation objects a data request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimObjectType {
    /// The user's aircraft
    User,
}

/// Outcome of one poll of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextDispatch {
    /// A raw receive frame, to be parsed with
    /// [`DispatchMessage::parse`](crate::types::DispatchMessage::parse)
    Message(Vec<u8>),
    /// Nothing queued right now. Not an error.
    Empty,
}

/// Classification of a native status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Ok,
    NoData,
    Failed(i32),
}

impl DispatchStatus {
    /// Map an HRESULT returned by the native next-dispatch call.
    ///
    /// `E_FAIL` only means the queue is empty; any other negative code means
    /// the link is broken.
    pub fn from_hresult(code: i32) -> Self {
        match code {
            E_FAIL => DispatchStatus::NoData,
            c if c < 0 => DispatchStatus::Failed(c),
            _ => DispatchStatus::Ok,
        }
    }

    /// Turn a status plus frame into a poll outcome.
    pub fn into_next(self, frame: impl FnOnce() -> Vec<u8>) -> Result<NextDispatch> {
        match self {
            DispatchStatus::Ok => Ok(NextDispatch::Message(frame())),
            DispatchStatus::NoData => Ok(NextDispatch::Empty),
            DispatchStatus::Failed(code) => Err(BridgeError::connection_failed(format!(
                "next dispatch failed with {:#010x}",
                code as u32
            ))),
        }
    }
}

/// Connection handle to a running simulator.
///
/// Implementations own the native handle; `close` releases it. All methods
/// take `&mut self` because the underlying handle is single-consumer.
#[async_trait::async_trait]
pub trait SimConnection: Send {
    /// Register a data definition and return the id the connection assigned.
    async fn register_schema(&mut self, schema: &RecordSchema) -> Result<DefineId>;

    /// Ask for one delivery of `define_id` for the given object type.
    ///
    /// The request is single-shot: the reply arrives as one `SimObjectData`
    /// message and must be re-issued to get the next one.
    async fn request_data(
        &mut self,
        request_id: RequestId,
        define_id: DefineId,
        target: SimObjectType,
    ) -> Result<()>;

    /// Pull the next queued frame.
    ///
    /// Returns:
    /// - `Ok(NextDispatch::Message(frame))` - a frame was queued
    /// - `Ok(NextDispatch::Empty)` - nothing queued yet
    /// - `Err(e)` - the link is broken; the caller must stop
    async fn next_message(&mut self) -> Result<NextDispatch>;

    /// Release the connection.
    async fn close(&mut self) -> Result<()>;
}
