//! Discovery events
//!
//! The network browser is an external collaborator; the engine only sees a
//! stream of "new"/"remove" events per kind. Events arrive as JSON lines
//! (from a pipe, a file or stdin) or over IPC.

use color_eyre::eyre::{self, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::{DeviceRecord, Kind, SampleSpec};

/// What happened to the announced record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    NewServer,
    NewSink,
    NewSource,
    RemoveServer,
    RemoveSink,
    RemoveSource,
}

impl Opcode {
    #[must_use]
    pub const fn kind(self) -> Kind {
        match self {
            Opcode::NewServer | Opcode::RemoveServer => Kind::Server,
            Opcode::NewSink | Opcode::RemoveSink => Kind::Sink,
            Opcode::NewSource | Opcode::RemoveSource => Kind::Source,
        }
    }

    #[must_use]
    pub const fn is_new(self) -> bool {
        matches!(self, Opcode::NewServer | Opcode::NewSink | Opcode::NewSource)
    }

    #[must_use]
    pub const fn new_for(kind: Kind) -> Self {
        match kind {
            Kind::Server => Opcode::NewServer,
            Kind::Sink => Opcode::NewSink,
            Kind::Source => Opcode::NewSource,
        }
    }

    #[must_use]
    pub const fn remove_for(kind: Kind) -> Self {
        match kind {
            Kind::Server => Opcode::RemoveServer,
            Kind::Sink => Opcode::RemoveSink,
            Kind::Source => Opcode::RemoveSource,
        }
    }
}

/// One event from the network browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub op: Opcode,
    pub name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_spec: Option<SampleSpec>,
}

impl DiscoveryEvent {
    /// Record carried by the event. Server records never carry a device.
    #[must_use]
    pub fn into_record(self) -> DeviceRecord {
        let is_device = self.op.kind().is_device();
        DeviceRecord {
            name: self.name,
            server: self.server,
            device: self.device.filter(|_| is_device),
            description: self.description,
            sample_spec: self.sample_spec,
        }
    }

    /// New records need a server address; removals only need the name.
    ///
    /// # Errors
    /// Returns an error if a new record has no server address.
    pub fn validate(&self) -> Result<()> {
        if self.op.is_new() && self.server.trim().is_empty() {
            eyre::bail!("New {} '{}' has no server address", self.op.kind(), self.name);
        }
        Ok(())
    }

    /// Removal event for a record name
    #[must_use]
    pub fn removal(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            op: Opcode::remove_for(kind),
            name: name.into(),
            server: String::new(),
            device: None,
            description: None,
            sample_spec: None,
        }
    }
}

/// Parse one JSON line; blank lines and `#` comments yield `None`
///
/// # Errors
/// Returns an error if the line is not a valid event.
pub fn parse_line(line: &str) -> Result<Option<DiscoveryEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let event: DiscoveryEvent = serde_json::from_str(line).context("Invalid discovery event")?;
    event.validate()?;
    Ok(Some(event))
}

/// Spawn a task reading JSON-lines events from `reader`.
///
/// Malformed lines are logged and skipped. The channel closes at end of input.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<DiscoveryEvent>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut line_no = 0usize;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    line_no += 1;
                    match parse_line(&line) {
                        Ok(Some(event)) => {
                            debug!("Discovery event: {:?} '{}'", event.op, event.name);
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Ignoring malformed discovery event on line {}: {:#}", line_no, e),
                    }
                }
                Ok(None) => {
                    info!("Discovery feed ended after {} lines", line_no);
                    break;
                }
                Err(e) => {
                    warn!("Discovery feed read error: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SampleFormat;

    #[test]
    fn test_parse_new_sink() {
        let event = parse_line(
            r#"{"op":"new_sink","name":"Kitchen","server":"tcp:kitchen","device":"alsa_output.0","sample_spec":{"format":"s16le","rate":44100,"channels":2}}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(event.op, Opcode::NewSink);
        assert_eq!(event.op.kind(), Kind::Sink);
        assert!(event.op.is_new());
        assert_eq!(
            event.sample_spec,
            Some(SampleSpec {
                format: SampleFormat::S16Le,
                rate: 44_100,
                channels: 2
            })
        );
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# recorded 2024-01-01").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_opcode() {
        assert!(parse_line(r#"{"op":"rename_sink","name":"x"}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_new_record_without_server() {
        assert!(parse_line(r#"{"op":"new_sink","name":"k","device":"d1"}"#).is_err());
        assert!(parse_line(r#"{"op":"new_server","name":"srv","server":"  "}"#).is_err());

        let removal = parse_line(r#"{"op":"remove_sink","name":"k"}"#).unwrap().unwrap();
        assert_eq!(removal.op, Opcode::RemoveSink);
    }

    #[test]
    fn test_server_record_drops_device() {
        let event = DiscoveryEvent {
            op: Opcode::NewServer,
            name: "srv".to_string(),
            server: "tcp:srv".to_string(),
            device: Some("bogus".to_string()),
            description: None,
            sample_spec: None,
        };
        assert_eq!(event.into_record().device, None);
    }

    #[test]
    fn test_removal_event() {
        let event = DiscoveryEvent::removal(Kind::Source, "mic");
        assert_eq!(event.op, Opcode::RemoveSource);
        assert!(!event.op.is_new());
    }

    #[tokio::test]
    async fn test_line_reader_skips_malformed_lines() {
        let input = b"{\"op\":\"new_server\",\"name\":\"a\",\"server\":\"tcp:a\"}\nnot json\n\n{\"op\":\"remove_server\",\"name\":\"a\"}\n";
        let mut rx = spawn_line_reader(&input[..]);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.op, Opcode::NewServer);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.op, Opcode::RemoveServer);
        assert!(rx.recv().await.is_none());
    }
}
