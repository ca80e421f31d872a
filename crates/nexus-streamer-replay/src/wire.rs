//! Outbound payload encoding.
//!
//! Every payload starts with a four byte schema id naming the body layout,
//! followed by the postcard-encoded body:
//!
//! | id     | body            |
//! |--------|-----------------|
//! | `ev42` | [`EventMessage`] |
//! | `f142` | [`LogMessage`]   |
//! | `pl72` | [`RunStart`]     |
//! | `6s4t` | [`RunStop`]      |

use bytes::Bytes;
use nexus_streamer_types::Scalar;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::WireError;

pub const EVENT_SCHEMA: [u8; 4] = *b"ev42";
pub const LOG_SCHEMA: [u8; 4] = *b"f142";
pub const RUN_START_SCHEMA: [u8; 4] = *b"pl72";
pub const RUN_STOP_SCHEMA: [u8; 4] = *b"6s4t";

/// All events of one pulse from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub source_name: String,
    /// Increments by one for every pulse a source publishes.
    pub message_id: u64,
    pub pulse_time_ns: i64,
    pub time_of_flight: Vec<u64>,
    pub detector_id: Vec<u32>,
}

/// One log sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub source_name: String,
    pub value: Scalar,
    pub timestamp_ns: i64,
}

/// Announces a run to file writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStart {
    pub job_id: String,
    pub filename: String,
    pub start_time_ms: i64,
    pub stop_time_ms: i64,
    pub run_name: String,
    pub instrument_name: String,
    pub broker: String,
    /// JSON description of the file structure to write.
    pub nexus_structure: String,
}

/// Ends the run started by the [`RunStart`] with the same job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStop {
    pub job_id: String,
    pub stop_time_ms: i64,
    pub run_name: String,
}

/// A decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Event(EventMessage),
    Log(LogMessage),
    RunStart(RunStart),
    RunStop(RunStop),
}

impl WireMessage {
    pub fn schema_id(&self) -> [u8; 4] {
        match self {
            WireMessage::Event(_) => EVENT_SCHEMA,
            WireMessage::Log(_) => LOG_SCHEMA,
            WireMessage::RunStart(_) => RUN_START_SCHEMA,
            WireMessage::RunStop(_) => RUN_STOP_SCHEMA,
        }
    }

    pub fn encode(&self) -> Result<Bytes, WireError> {
        match self {
            WireMessage::Event(body) => encode_body(EVENT_SCHEMA, body),
            WireMessage::Log(body) => encode_body(LOG_SCHEMA, body),
            WireMessage::RunStart(body) => encode_body(RUN_START_SCHEMA, body),
            WireMessage::RunStop(body) => encode_body(RUN_STOP_SCHEMA, body),
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let id = schema_id(payload).ok_or(WireError::Truncated { len: payload.len() })?;
        let body = &payload[4..];
        match id {
            EVENT_SCHEMA => decode_body(id, body).map(WireMessage::Event),
            LOG_SCHEMA => decode_body(id, body).map(WireMessage::Log),
            RUN_START_SCHEMA => decode_body(id, body).map(WireMessage::RunStart),
            RUN_STOP_SCHEMA => decode_body(id, body).map(WireMessage::RunStop),
            other => Err(WireError::UnknownSchema(other)),
        }
    }
}

pub fn encode_event(message: &EventMessage) -> Result<Bytes, WireError> {
    encode_body(EVENT_SCHEMA, message)
}

pub fn encode_log(message: &LogMessage) -> Result<Bytes, WireError> {
    encode_body(LOG_SCHEMA, message)
}

pub fn encode_run_start(message: &RunStart) -> Result<Bytes, WireError> {
    encode_body(RUN_START_SCHEMA, message)
}

pub fn encode_run_stop(message: &RunStop) -> Result<Bytes, WireError> {
    encode_body(RUN_STOP_SCHEMA, message)
}

/// Reads the schema id of a payload without decoding the body.
pub fn schema_id(payload: &[u8]) -> Option<[u8; 4]> {
    payload.first_chunk::<4>().copied()
}

/// Printable form of a schema id.
pub fn schema_name(id: [u8; 4]) -> &'static str {
    match id {
        EVENT_SCHEMA => "ev42",
        LOG_SCHEMA => "f142",
        RUN_START_SCHEMA => "pl72",
        RUN_STOP_SCHEMA => "6s4t",
        _ => "unknown",
    }
}

fn encode_body<T: Serialize>(id: [u8; 4], body: &T) -> Result<Bytes, WireError> {
    let encoded = postcard::to_allocvec(body).map_err(|e| WireError::Encode {
        schema: schema_name(id),
        reason: e.to_string(),
    })?;
    let mut payload = Vec::with_capacity(4 + encoded.len());
    payload.extend_from_slice(&id);
    payload.extend_from_slice(&encoded);
    Ok(Bytes::from(payload))
}

fn decode_body<T: DeserializeOwned>(id: [u8; 4], body: &[u8]) -> Result<T, WireError> {
    postcard::from_bytes(body).map_err(|e| WireError::Decode {
        schema: schema_name(id),
        reason: e.to_string(),
    })
}
