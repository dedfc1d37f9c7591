//! IPC infrastructure for daemon communication
//!
//! Provides Unix socket-based IPC for CLI commands to communicate with the daemon.
//! Uses length-prefixed JSON messages for protocol framing.

use color_eyre::eyre::{self, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::discovery::DiscoveryEvent;
use crate::indicator::IndicatorInfo;
use crate::registry::Kind;
use crate::selection::Selection;

// ============================================================================
// Message Types
// ============================================================================

/// Requests sent from CLI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Query daemon status
    Status,
    /// List discovered servers, sinks and sources
    ListDevices,
    /// Select a discovered record by name
    SelectRecord { kind: Kind, name: String },
    /// Select a server by address (`None` = default)
    SetServer { server: Option<String> },
    /// Select a sink (`server` and `device` both `None` = default)
    SetSink {
        server: Option<String>,
        device: Option<String>,
    },
    /// Select a source (`server` and `device` both `None` = default)
    SetSource {
        server: Option<String>,
        device: Option<String>,
    },
    /// Inject a discovery event
    Announce { event: DiscoveryEvent },
    /// Gracefully shutdown the daemon
    Shutdown,
}

/// Responses sent from daemon to CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Status information
    Status {
        version: String,
        uptime_secs: u64,
        selection: Selection,
        indicators: Vec<IndicatorInfo>,
    },
    /// Discovered records
    Devices { devices: Vec<DeviceInfo> },
    /// Generic success response
    Ok { message: String },
    /// Error response
    Error { message: String },
}

/// Discovered record as reported over IPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub kind: Kind,
    pub name: String,
    pub server: String,
    pub device: Option<String>,
    pub description: Option<String>,
    /// Formatted sample specification (`s16le 2ch 44100Hz`)
    pub sample_spec: Option<String>,
    /// Whether this record is the current selection
    pub active: bool,
}

// ============================================================================
// Socket Path Management
// ============================================================================

/// Get the IPC socket path
/// Prefers `$XDG_RUNTIME_DIR/devchooser.sock`, falls back to `/tmp/devchooser-$UID.sock`
#[must_use]
pub fn get_socket_path() -> PathBuf {
    match dirs::runtime_dir() {
        Some(runtime_dir) => runtime_dir.join("devchooser.sock"),
        None => PathBuf::from(format!("/tmp/devchooser-{}.sock", users::get_current_uid())),
    }
}

/// Whether a daemon answers on the socket
pub async fn is_daemon_running() -> bool {
    probe(&get_socket_path()).await
}

async fn probe(socket_path: &Path) -> bool {
    matches!(
        tokio::time::timeout(Duration::from_millis(100), UnixStream::connect(socket_path)).await,
        Ok(Ok(_))
    )
}

/// Clean up stale socket file
/// Checks if socket exists and if daemon is actually running
async fn cleanup_stale_socket(socket_path: &Path) -> Result<()> {
    if !socket_path.exists() {
        return Ok(());
    }

    if probe(socket_path).await {
        eyre::bail!("Daemon is already running (socket: {})", socket_path.display());
    }

    debug!("Removing stale socket: {:?}", socket_path);
    std::fs::remove_file(socket_path)
        .with_context(|| format!("Failed to remove stale socket: {socket_path:?}"))?;
    Ok(())
}

// ============================================================================
// Protocol Helpers
// ============================================================================

const MAX_MESSAGE_SIZE: usize = 1024 * 1024; // 1MB max message size
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Read a length-prefixed JSON message from a stream
async fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut UnixStream) -> Result<T> {
    let mut len_buf = [0u8; 4];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut len_buf))
        .await
        .context("Timeout reading message length")?
        .context("Failed to read message length")?;

    let msg_len = u32::from_be_bytes(len_buf) as usize;

    if msg_len > MAX_MESSAGE_SIZE {
        eyre::bail!("Message too large: {msg_len} bytes (max: {MAX_MESSAGE_SIZE})");
    }

    let mut msg_buf = vec![0u8; msg_len];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut msg_buf))
        .await
        .context("Timeout reading message payload")?
        .context("Failed to read message payload")?;

    serde_json::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write a length-prefixed JSON message to a stream
async fn write_message<T: Serialize>(stream: &mut UnixStream, message: &T) -> Result<()> {
    let json = serde_json::to_vec(message).context("Failed to serialize message")?;

    let len = u32::try_from(json.len())
        .ok()
        .filter(|len| *len as usize <= MAX_MESSAGE_SIZE)
        .ok_or_else(|| eyre::eyre!("Message too large: {} bytes (max: {MAX_MESSAGE_SIZE})", json.len()))?;

    stream
        .write_all(&len.to_be_bytes())
        .await
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .await
        .context("Failed to write message payload")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

// ============================================================================
// IPC Client (for CLI commands)
// ============================================================================

/// Send a request to the daemon and wait for response
///
/// # Errors
/// Returns an error if the daemon is unreachable or the exchange fails.
pub async fn send_request(request: Request) -> Result<Response> {
    send_request_to(&get_socket_path(), request).await
}

/// Send a request to the daemon listening on `socket_path`
///
/// # Errors
/// Returns an error if the daemon is unreachable or the exchange fails.
pub async fn send_request_to(socket_path: &Path, request: Request) -> Result<Response> {
    let mut stream = tokio::time::timeout(Duration::from_secs(5), UnixStream::connect(socket_path))
        .await
        .context("Timeout connecting to daemon")?
        .with_context(|| {
            format!("Failed to connect to daemon. Is the daemon running?\nSocket: {socket_path:?}")
        })?;

    debug!("Connected to daemon at {:?}", socket_path);

    write_message(&mut stream, &request).await?;
    read_message(&mut stream).await
}

// ============================================================================
// IPC Server (for daemon)
// ============================================================================

/// Handle for the IPC server running in the daemon
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Create and bind a new IPC server on the default socket path
    ///
    /// # Errors
    /// Returns an error if another daemon is running or binding fails.
    pub async fn bind() -> Result<Self> {
        Self::bind_to(get_socket_path()).await
    }

    /// Create and bind a new IPC server at `socket_path`
    ///
    /// # Errors
    /// Returns an error if another daemon is running or binding fails.
    pub async fn bind_to(socket_path: PathBuf) -> Result<Self> {
        cleanup_stale_socket(&socket_path).await?;

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind IPC socket: {socket_path:?}"))?;

        debug!("IPC server listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept the next incoming connection
    /// Returns None if accept fails (non-fatal)
    pub async fn accept(&self) -> Option<UnixStream> {
        match self.listener.accept().await {
            Ok((stream, _addr)) => Some(stream),
            Err(e) => {
                error!("Failed to accept IPC connection: {}", e);
                None
            }
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!("Failed to remove IPC socket on shutdown: {}", e);
        } else {
            debug!("Removed IPC socket: {:?}", self.socket_path);
        }
    }
}

/// Read a request from a client connection
///
/// # Errors
/// Returns an error on timeout, oversize frames or malformed JSON.
pub async fn read_request(stream: &mut UnixStream) -> Result<Request> {
    read_message(stream).await
}

/// Write a response to a client connection
///
/// # Errors
/// Returns an error if the response cannot be written.
pub async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    write_message(stream, response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Opcode;

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(Request::SelectRecord {
            kind: Kind::Sink,
            name: "Kitchen".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "SelectRecord", "kind": "sink", "name": "Kitchen"})
        );
    }

    #[test]
    fn test_announce_carries_event() {
        let request: Request = serde_json::from_str(
            r#"{"type":"Announce","event":{"op":"new_server","name":"a","server":"tcp:a"}}"#,
        )
        .unwrap();
        match request {
            Request::Announce { event } => assert_eq!(event.op, Opcode::NewServer),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_response_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = IpcServer::bind_to(socket_path.clone()).await.unwrap();

        let handle = tokio::spawn(async move {
            let mut stream = server.accept().await.unwrap();
            let request = read_request(&mut stream).await.unwrap();
            assert_eq!(request, Request::Status);
            write_response(
                &mut stream,
                &Response::Ok {
                    message: "pong".to_string(),
                },
            )
            .await
            .unwrap();
            server
        });

        let response = send_request_to(&socket_path, Request::Status).await.unwrap();
        assert_eq!(
            response,
            Response::Ok {
                message: "pong".to_string()
            }
        );

        drop(handle.await.unwrap());
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_bind_refuses_running_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = IpcServer::bind_to(socket_path.clone()).await.unwrap();
        assert!(IpcServer::bind_to(socket_path).await.is_err());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        std::fs::write(&socket_path, b"").unwrap();
        assert!(IpcServer::bind_to(socket_path).await.is_ok());
    }
}
