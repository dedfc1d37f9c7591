//! Daemon mode
//!
//! Runs the main event loop: discovery events, IPC requests, file-watch
//! events and notification dismissals all arrive here and are applied to
//! the single [`State`] in order.

use color_eyre::eyre::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::discovery::{self, DiscoveryEvent};
use crate::indicator::ControlTable;
use crate::ipc::{self, DeviceInfo, IpcServer, Request, Response};
use crate::logging;
use crate::notification::{DesktopSurface, Notifier};
use crate::properties::{FileStore, Publisher};
use crate::registry::Kind;
use crate::selection::SelectionRequest;
use crate::state::{SelectionOutcome, State};
use crate::watch::{self, WatchEvent};

/// A request forwarded from a connection task to the event loop
type Command = (Request, oneshot::Sender<Response>);

/// Run the daemon with the given configuration.
///
/// `events` overrides the configured discovery feed (`-` = stdin).
///
/// # Errors
/// Returns an error if logging, the IPC socket or signal handling cannot be set up.
pub async fn run(config: Config, foreground: bool, events: Option<PathBuf>) -> Result<()> {
    let _log_guard = logging::init_daemon(&config.settings.log_level, foreground)?;

    info!("Starting devchooser daemon");
    let started_at = Instant::now();

    let config_path = Config::get_config_path()?;
    let property_path = config.property_store_path()?;
    info!("Property store: {:?}", property_path);

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    let notifier = Notifier::new(
        Box::new(DesktopSurface::new(closed_tx)),
        config.notifications.clone(),
        started_at,
    );
    let publisher = Publisher::new(Box::new(FileStore::new(&property_path)));
    let mut state = State::new(publisher, notifier, ControlTable::new());

    let mut discovery_rx = match events.or_else(|| config.settings.events.clone()) {
        Some(path) => Some(open_feed(&path).await?),
        None => {
            info!("No discovery feed configured; waiting for announcements over IPC");
            None
        }
    };

    let (_watcher, mut watch_rx) = match watch::spawn(&config_path, &property_path) {
        Ok((watcher, rx)) => (Some(watcher), Some(rx)),
        Err(e) => {
            warn!("File watching disabled: {:#}", e);
            (None, None)
        }
    };

    let ipc_server = IpcServer::bind().await?;
    info!("IPC server listening on {:?}", ipc_server.socket_path());
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(32);

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
        debug!("sd_notify READY failed: {}", e);
    }

    loop {
        tokio::select! {
            event = next(&mut discovery_rx) => match event {
                Some(event) => state.handle_discovery(event),
                None => {
                    info!("Discovery feed closed");
                    discovery_rx = None;
                }
            },

            Some(mut stream) = ipc_server.accept() => {
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = forward_connection(&mut stream, cmd_tx).await {
                        error!("IPC request handling error: {:#}", e);
                    }
                });
            }

            Some((request, reply)) = cmd_rx.recv() => {
                if request == Request::Shutdown {
                    info!("Shutdown requested via IPC");
                    let _ = reply.send(Response::Ok {
                        message: "Daemon shutting down...".to_string(),
                    });
                    break;
                }
                let response = handle_request(&mut state, request, started_at);
                let _ = reply.send(response);
            }

            event = next(&mut watch_rx) => match event {
                Some(WatchEvent::Config) => reload_settings(&mut state, &config_path),
                Some(WatchEvent::Properties) => adopt_store_change(&mut state),
                None => {
                    warn!("File watcher stopped");
                    watch_rx = None;
                }
            },

            Some(id) = closed_rx.recv() => state.notification_dismissed(id),

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }

            _ = sigterm.recv() => {
                info!("Terminated");
                break;
            }
        }
    }

    info!("Shutting down");
    if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]) {
        debug!("sd_notify STOPPING failed: {}", e);
    }
    state.relinquish();

    Ok(())
}

/// Receive from an optional channel; pends forever when absent
async fn next<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn open_feed(path: &Path) -> Result<mpsc::UnboundedReceiver<DiscoveryEvent>> {
    if path == Path::new("-") {
        info!("Reading discovery events from stdin");
        return Ok(discovery::spawn_line_reader(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open discovery feed: {path:?}"))?;
    info!("Reading discovery events from {:?}", path);
    Ok(discovery::spawn_line_reader(file))
}

fn reload_settings(state: &mut State, config_path: &Path) {
    match Config::load_from_path(config_path) {
        Ok(config) => {
            if &config.notifications != state.notifier().settings() {
                info!("Notification settings reloaded");
                state.apply_settings(config.notifications);
            }
        }
        Err(e) => warn!("Ignoring invalid config change: {:#}", e),
    }
}

/// Adopt a selection written to the property store by someone else.
///
/// An unreadable store (half-written, foreign format) is not a cleared one:
/// the current selection stays.
fn adopt_store_change(state: &mut State) {
    match state.publisher().try_load() {
        Ok(observed) if &observed != state.selection() => {
            info!("Property store changed externally");
            state.adopt_external(observed);
        }
        Ok(_) => {}
        Err(e) => warn!("Ignoring unreadable property store: {:#}", e),
    }
}

/// Read one request, hand it to the event loop and write back its answer
async fn forward_connection(stream: &mut tokio::net::UnixStream, cmd_tx: mpsc::Sender<Command>) -> Result<()> {
    let request = ipc::read_request(stream).await?;
    let (reply_tx, reply_rx) = oneshot::channel();

    let response = if cmd_tx.send((request, reply_tx)).await.is_ok() {
        reply_rx.await.unwrap_or_else(|_| Response::Error {
            message: "Daemon is shutting down".to_string(),
        })
    } else {
        Response::Error {
            message: "Daemon is shutting down".to_string(),
        }
    };

    ipc::write_response(stream, &response).await
}

/// Apply one IPC request to the state
fn handle_request(state: &mut State, request: Request, started_at: Instant) -> Response {
    match request {
        Request::Status => Response::Status {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: started_at.elapsed().as_secs(),
            selection: state.selection().clone(),
            indicators: state.indicator_infos(),
        },

        Request::ListDevices => Response::Devices {
            devices: device_list(state),
        },

        Request::SelectRecord { kind, name } => match state.select_record(kind, &name) {
            Some(outcome) => outcome_response(outcome, &format!("{kind} '{name}'")),
            None => Response::Error {
                message: format!("No {kind} named '{name}' has been discovered"),
            },
        },

        Request::SetServer { server } => {
            let what = describe("server", server.as_deref());
            outcome_response(state.set_selection(SelectionRequest::Server(server)), &what)
        }

        Request::SetSink { server, device } => {
            let what = describe("sink", device.as_deref());
            outcome_response(state.set_selection(SelectionRequest::Sink { server, device }), &what)
        }

        Request::SetSource { server, device } => {
            let what = describe("source", device.as_deref());
            outcome_response(
                state.set_selection(SelectionRequest::Source { server, device }),
                &what,
            )
        }

        Request::Announce { event } => {
            if let Err(e) = event.validate() {
                return Response::Error {
                    message: format!("{e:#}"),
                };
            }
            let message = format!(
                "{} {} '{}'",
                if event.op.is_new() { "Announced" } else { "Withdrew" },
                event.op.kind(),
                event.name
            );
            state.handle_discovery(event);
            Response::Ok { message }
        }

        Request::Shutdown => Response::Error {
            message: "Shutdown is handled by the event loop".to_string(),
        },
    }
}

fn describe(kind: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{kind} '{value}'"),
        None => format!("default {kind}"),
    }
}

fn outcome_response(outcome: SelectionOutcome, what: &str) -> Response {
    match outcome {
        SelectionOutcome::Changed => Response::Ok {
            message: format!("Selected {what}"),
        },
        SelectionOutcome::Unchanged => Response::Ok {
            message: format!("Already using {what}"),
        },
        SelectionOutcome::Suppressed => Response::Error {
            message: "Selection is being synchronized, try again".to_string(),
        },
    }
}

/// Every discovered record, servers first, by name
fn device_list(state: &State) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    for kind in Kind::ALL {
        let active = state.indicator(kind).record_name();
        let mut records: Vec<_> = state.registries().get(kind).iter().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        devices.extend(records.into_iter().map(|record| DeviceInfo {
            kind,
            name: record.name.clone(),
            server: record.server.clone(),
            device: record.device.clone(),
            description: record.description.clone(),
            sample_spec: record.sample_spec.map(|spec| spec.to_string()),
            active: active == Some(record.name.as_str()),
        }));
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationSettings;
    use crate::discovery::Opcode;
    use crate::notification::{NotificationId, NotificationSurface};
    use crate::indicator::Indicator;
    use crate::properties::{MemoryStore, PropertyKey, PropertyStore};
    use crate::selection::Selection;
    use std::fs;

    struct Silent;

    impl NotificationSurface for Silent {
        fn open(&mut self, _summary: &str, _body: &str) -> Result<NotificationId> {
            Ok(1)
        }

        fn update(&mut self, _id: NotificationId, _summary: &str, _body: &str) -> Result<()> {
            Ok(())
        }
    }

    fn make_state_with(store: Box<dyn PropertyStore>) -> State {
        let notifier = Notifier::new(Box::new(Silent), NotificationSettings::default(), Instant::now());
        State::new(Publisher::new(store), notifier, ControlTable::new())
    }

    fn make_state() -> State {
        make_state_with(Box::new(MemoryStore::new()))
    }

    /// State backed by a property file holding server `tcp:A` and sink `d1`
    fn make_file_state(dir: &Path) -> (State, PathBuf) {
        let path = dir.join("properties.json");
        let mut store = FileStore::new(&path);
        store.set(PropertyKey::Server, "tcp:A").unwrap();
        store.set(PropertyKey::Sink, "d1").unwrap();
        (make_state_with(Box::new(store)), path)
    }

    fn announce(op: Opcode, name: &str, server: &str, device: Option<&str>) -> Request {
        Request::Announce {
            event: DiscoveryEvent {
                op,
                name: name.to_string(),
                server: server.to_string(),
                device: device.map(String::from),
                description: None,
                sample_spec: None,
            },
        }
    }

    #[test]
    fn test_select_unknown_record_is_error() {
        let mut state = make_state();
        let response = handle_request(
            &mut state,
            Request::SelectRecord {
                kind: Kind::Sink,
                name: "ghost".to_string(),
            },
            Instant::now(),
        );
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn test_announce_then_select_marks_device_active() {
        let mut state = make_state();
        handle_request(&mut state, announce(Opcode::NewSink, "b-sink", "tcp:b", Some("d2")), Instant::now());
        handle_request(&mut state, announce(Opcode::NewSink, "a-sink", "tcp:a", Some("d1")), Instant::now());
        handle_request(&mut state, announce(Opcode::NewServer, "srv", "tcp:a", None), Instant::now());

        let response = handle_request(
            &mut state,
            Request::SelectRecord {
                kind: Kind::Sink,
                name: "a-sink".to_string(),
            },
            Instant::now(),
        );
        assert_eq!(
            response,
            Response::Ok {
                message: "Selected sink 'a-sink'".to_string()
            }
        );

        let devices = device_list(&state);
        let names: Vec<(Kind, &str, bool)> = devices
            .iter()
            .map(|d| (d.kind, d.name.as_str(), d.active))
            .collect();
        assert_eq!(
            names,
            vec![
                (Kind::Server, "srv", true),
                (Kind::Sink, "a-sink", true),
                (Kind::Sink, "b-sink", false),
            ]
        );
    }

    #[test]
    fn test_set_default_server_reports_unchanged() {
        let mut state = make_state();
        let response = handle_request(&mut state, Request::SetServer { server: None }, Instant::now());
        assert_eq!(
            response,
            Response::Ok {
                message: "Already using default server".to_string()
            }
        );
    }

    #[test]
    fn test_status_reports_selection_and_indicators() {
        let mut state = make_state();
        handle_request(
            &mut state,
            Request::SetSink {
                server: None,
                device: Some("typed".to_string()),
            },
            Instant::now(),
        );

        match handle_request(&mut state, Request::Status, Instant::now()) {
            Response::Status {
                selection,
                indicators,
                ..
            } => {
                assert_eq!(selection.sink.as_deref(), Some("typed"));
                assert_eq!(indicators[1].value.as_deref(), Some("typed"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_store_keeps_selection() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, path) = make_file_state(dir.path());
        let before = state.selection().clone();
        assert_eq!(before.server.as_deref(), Some("tcp:A"));

        // Another writer is halfway through replacing the file
        fs::write(&path, r#"{"PULSE_SERVER": "tcp:B""#).unwrap();
        adopt_store_change(&mut state);

        assert_eq!(state.selection(), &before);
        assert_eq!(state.indicator(Kind::Server), &Indicator::Other("tcp:A".to_string()));
        assert_eq!(state.indicator(Kind::Sink), &Indicator::Other("d1".to_string()));
    }

    #[test]
    fn test_readable_store_change_is_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, path) = make_file_state(dir.path());

        fs::write(&path, r#"{"PULSE_SERVER": "tcp:B", "PULSE_ID": "77@elsewhere"}"#).unwrap();
        adopt_store_change(&mut state);

        assert_eq!(
            state.selection(),
            &Selection {
                server: Some("tcp:B".to_string()),
                sink: None,
                source: None,
            }
        );
        // Adopted, not re-published: the other writer keeps control
        assert!(fs::read_to_string(&path).unwrap().contains("77@elsewhere"));
    }

    #[test]
    fn test_announce_without_server_is_rejected() {
        let mut state = make_state();
        let response = handle_request(&mut state, announce(Opcode::NewSink, "k", "", Some("d1")), Instant::now());

        assert!(matches!(response, Response::Error { .. }));
        assert!(state.registries().get(Kind::Sink).is_empty());
    }
}
