//! Variant messages delivered by the simulator connection
//!
//! Every message starts with the SimConnect receive header
//! (`dwSize`, `dwVersion`, `dwID`), followed by a kind-specific body.
//! Parsing goes through [`ByteCursor`], so a truncated frame becomes an
//! error instead of an out-of-bounds read.

use crate::decode::ByteCursor;
use crate::{BridgeError, Result};

use super::{DefineId, RequestId};

/// Length of `szApplicationName` in the open message.
const APPLICATION_NAME_LEN: usize = 256;
/// Receive structure version written by [`DispatchMessage::encode`].
const RECV_VERSION: u32 = 6;
/// Size of the common receive header.
pub const RECV_HEADER_SIZE: usize = 12;

const RECV_ID_EXCEPTION: u32 = 1;
const RECV_ID_OPEN: u32 = 2;
const RECV_ID_EVENT: u32 = 4;
const RECV_ID_SIMOBJECT_DATA: u32 = 8;
const RECV_ID_SIMOBJECT_DATA_BYTYPE: u32 = 9;

/// Message kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Open,
    Exception,
    Event,
    SimObjectData,
    Unknown,
}

/// Connection acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInfo {
    pub application_name: String,
    pub application_version: (u32, u32),
    pub application_build: (u32, u32),
    pub simconnect_version: (u32, u32),
    pub simconnect_build: (u32, u32),
}

/// Payload of a simulation-object data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimObjectData {
    pub request_id: RequestId,
    pub object_id: u32,
    pub define_id: DefineId,
    pub flags: u32,
    pub entry_number: u32,
    pub out_of: u32,
    pub define_count: u32,
    /// Packed record bytes, laid out per the registered schema
    pub payload: Vec<u8>,
}

/// One message from the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMessage {
    Open(OpenInfo),
    Exception { code: u32, send_id: u32, index: u32 },
    Event { group_id: u32, event_id: u32, data: u32 },
    SimObjectData(SimObjectData),
    Unknown { id: u32 },
}

impl DispatchMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            DispatchMessage::Open(_) => MessageKind::Open,
            DispatchMessage::Exception { .. } => MessageKind::Exception,
            DispatchMessage::Event { .. } => MessageKind::Event,
            DispatchMessage::SimObjectData(_) => MessageKind::SimObjectData,
            DispatchMessage::Unknown { .. } => MessageKind::Unknown,
        }
    }

    /// Parse a raw receive buffer.
    ///
    /// `dwSize` larger than the buffer is rejected; trailing bytes beyond
    /// `dwSize` are ignored.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut header = ByteCursor::new(raw);
        let size = header.read_u32()? as usize;
        let _version = header.read_u32()?;
        let id = header.read_u32()?;

        if size < RECV_HEADER_SIZE || size > raw.len() {
            return Err(BridgeError::parse_error(
                "dispatch header",
                format!("declared size {} but frame holds {} bytes", size, raw.len()),
            ));
        }

        let mut body = ByteCursor::new(&raw[RECV_HEADER_SIZE..size]);

        let message = match id {
            RECV_ID_EXCEPTION => DispatchMessage::Exception {
                code: body.read_u32()?,
                send_id: body.read_u32()?,
                index: body.read_u32()?,
            },
            RECV_ID_OPEN => {
                let application_name = body.read_fixed_str(APPLICATION_NAME_LEN)?;
                DispatchMessage::Open(OpenInfo {
                    application_name,
                    application_version: (body.read_u32()?, body.read_u32()?),
                    application_build: (body.read_u32()?, body.read_u32()?),
                    simconnect_version: (body.read_u32()?, body.read_u32()?),
                    simconnect_build: (body.read_u32()?, body.read_u32()?),
                })
            }
            RECV_ID_EVENT => DispatchMessage::Event {
                group_id: body.read_u32()?,
                event_id: body.read_u32()?,
                data: body.read_u32()?,
            },
            RECV_ID_SIMOBJECT_DATA | RECV_ID_SIMOBJECT_DATA_BYTYPE => {
                DispatchMessage::SimObjectData(SimObjectData {
                    request_id: RequestId(body.read_u32()?),
                    object_id: body.read_u32()?,
                    define_id: DefineId(body.read_u32()?),
                    flags: body.read_u32()?,
                    entry_number: body.read_u32()?,
                    out_of: body.read_u32()?,
                    define_count: body.read_u32()?,
                    payload: body.rest().to_vec(),
                })
            }
            other => DispatchMessage::Unknown { id: other },
        };

        Ok(message)
    }

    /// Serialize into the receive wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let id = match self {
            DispatchMessage::Exception { code, send_id, index } => {
                push_u32s(&mut body, &[*code, *send_id, *index]);
                RECV_ID_EXCEPTION
            }
            DispatchMessage::Open(info) => {
                let name = info.application_name.as_bytes();
                let len = name.len().min(APPLICATION_NAME_LEN - 1);
                body.extend_from_slice(&name[..len]);
                body.resize(APPLICATION_NAME_LEN, 0);
                push_u32s(
                    &mut body,
                    &[
                        info.application_version.0,
                        info.application_version.1,
                        info.application_build.0,
                        info.application_build.1,
                        info.simconnect_version.0,
                        info.simconnect_version.1,
                        info.simconnect_build.0,
                        info.simconnect_build.1,
                        0,
                        0,
                    ],
                );
                RECV_ID_OPEN
            }
            DispatchMessage::Event { group_id, event_id, data } => {
                push_u32s(&mut body, &[*group_id, *event_id, *data]);
                RECV_ID_EVENT
            }
            DispatchMessage::SimObjectData(data) => {
                push_u32s(
                    &mut body,
                    &[
                        data.request_id.0,
                        data.object_id,
                        data.define_id.0,
                        data.flags,
                        data.entry_number,
                        data.out_of,
                        data.define_count,
                    ],
                );
                body.extend_from_slice(&data.payload);
                RECV_ID_SIMOBJECT_DATA_BYTYPE
            }
            DispatchMessage::Unknown { id } => *id,
        };

        let mut frame = Vec::with_capacity(RECV_HEADER_SIZE + body.len());
        push_u32s(&mut frame, &[(RECV_HEADER_SIZE + body.len()) as u32, RECV_VERSION, id]);
        frame.extend_from_slice(&body);
        frame
    }
}

fn push_u32s(out: &mut Vec<u8>, values: &[u32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
