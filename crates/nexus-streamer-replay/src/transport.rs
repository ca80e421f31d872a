//! Transports: where the delivery worker writes messages.
//!
//! The bundled transport writes one JSON object per line:
//!
//! ```json
//! {"topic":"LOKI_events","schema":"ev42","timestamp_ms":1600000000000,"timestamp_ns":1600000000000000000,"payload":"ZXY0Mg..."}
//! ```
//!
//! The payload is base64 so binary bodies survive line-oriented tooling.

use std::fmt::Debug;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tracing::info;

use crate::channel::OutboundMessage;
use crate::{TransportError, wire};

/// Delivers messages taken off the queue. Called from one thread only.
pub trait Transport: Send + Debug {
    fn deliver(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Pushes buffered output to its destination.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    topic: &'a str,
    schema: &'a str,
    timestamp_ms: i64,
    timestamp_ns: i64,
    payload: String,
}

/// Writes messages as JSON lines to any writer.
#[derive(Debug)]
pub struct JsonLinesTransport<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, TransportError> {
        self.writer
            .into_inner()
            .map_err(|e| TransportError::Io(e.into_error()))
    }
}

impl<W: Write + Send + Debug> Transport for JsonLinesTransport<W> {
    fn deliver(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let schema = wire::schema_id(&message.payload).map_or("unknown", wire::schema_name);
        let line = JsonLine {
            topic: &message.topic,
            schema,
            timestamp_ms: message.timestamp_ns.div_euclid(1_000_000),
            timestamp_ns: message.timestamp_ns,
            payload: STANDARD.encode(&message.payload),
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps delivered messages in memory. Useful for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    delivered: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for MemoryTransport {
    fn deliver(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Opens the transport for an output target.
///
/// - `-` writes to stdout
/// - `tcp://host:port` connects and streams lines over TCP
/// - anything else is a file path, appended to
pub fn connect(target: &str) -> Result<Box<dyn Transport>, TransportError> {
    if target == "-" {
        info!("writing messages to stdout");
        return Ok(Box::new(JsonLinesTransport::new(std::io::stdout())));
    }
    if let Some(address) = target.strip_prefix("tcp://") {
        if address.is_empty() {
            return Err(TransportError::InvalidTarget(target.to_string()));
        }
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        info!(address, "connected to broker");
        return Ok(Box::new(JsonLinesTransport::new(stream)));
    }
    if target.is_empty() {
        return Err(TransportError::InvalidTarget(target.to_string()));
    }
    let file = OpenOptions::new().create(true).append(true).open(target)?;
    info!(path = target, "writing messages to file");
    Ok(Box::new(JsonLinesTransport::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn message(topic: &str, payload: &'static [u8]) -> OutboundMessage {
        OutboundMessage {
            topic: topic.into(),
            payload: Bytes::from_static(payload),
            timestamp_ns: 1_500_000_999,
        }
    }

    #[test]
    fn json_lines_carry_base64_payload() {
        let mut transport = JsonLinesTransport::new(Vec::new());
        transport.deliver(&message("LOKI_events", b"ev42body")).unwrap();
        transport.deliver(&message("LOKI_sampleEnv", b"?")).unwrap();
        Transport::flush(&mut transport).unwrap();

        let out = String::from_utf8(transport.into_inner().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["topic"], "LOKI_events");
        assert_eq!(lines[0]["schema"], "ev42");
        assert_eq!(lines[0]["timestamp_ms"], 1_500);
        assert_eq!(
            STANDARD.decode(lines[0]["payload"].as_str().unwrap()).unwrap(),
            b"ev42body"
        );
        assert_eq!(lines[1]["schema"], "unknown");
    }

    #[test]
    fn memory_transport_shares_deliveries() {
        let transport = MemoryTransport::new();
        let mut worker_side = transport.clone();
        worker_side.deliver(&message("t", b"f142")).unwrap();
        assert_eq!(transport.delivered().len(), 1);
    }

    #[test]
    fn file_target_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let target = path.to_str().unwrap();
        for _ in 0..2 {
            let mut transport = connect(target).unwrap();
            transport.deliver(&message("t", b"pl72")).unwrap();
            transport.flush().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn empty_targets_rejected() {
        assert!(matches!(connect(""), Err(TransportError::InvalidTarget(_))));
        assert!(matches!(connect("tcp://"), Err(TransportError::InvalidTarget(_))));
    }
}
