//! CLI commands
//!
//! Implements both local commands (validate, notify, autostart) and IPC-based
//! commands that talk to the daemon (list-devices, select, set-*, announce,
//! withdraw, shutdown). `status` works either way.

use color_eyre::eyre::{self, Result};
use crossterm::style::Stylize;

use crate::autostart::Autostart;
use crate::cli::{AnnounceArgs, AutostartAction, NotifyTarget};
use crate::config::Config;
use crate::discovery::{DiscoveryEvent, Opcode};
use crate::indicator::{IndicatorInfo, IndicatorState};
use crate::ipc::{self, DeviceInfo, Request, Response};
use crate::properties::{FileStore, Publisher};
use crate::registry::{Kind, SampleSpec};
use crate::selection::Selection;
use crate::style::ChooserStyle;

// ============================================================================
// Helpers
// ============================================================================

/// Format uptime in human-readable form
fn format_uptime(secs: u64) -> String {
    const SECS_PER_MINUTE: u64 = 60;
    const SECS_PER_HOUR: u64 = 3600;

    if secs < SECS_PER_MINUTE {
        return format!("{secs}s");
    }
    if secs < SECS_PER_HOUR {
        return format!("{mins}m", mins = secs / SECS_PER_MINUTE);
    }
    let hours = secs / SECS_PER_HOUR;
    let mins = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    if mins > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{hours}h")
    }
}

fn section_title(kind: Kind) -> &'static str {
    match kind {
        Kind::Server => "SERVERS:",
        Kind::Sink => "SINKS:",
        Kind::Source => "SOURCES:",
    }
}

fn indicator_text(info: &IndicatorInfo) -> String {
    let value = info.value.as_deref().unwrap_or_default();
    match info.state {
        IndicatorState::Specific => value.bold().success().to_string(),
        IndicatorState::Default => "Default".dim().to_string(),
        IndicatorState::Other => format!("Other ({value})").warning().to_string(),
    }
}

/// Send a request to a running daemon
async fn request(request: Request) -> Result<Response> {
    if !ipc::is_daemon_running().await {
        eyre::bail!("Daemon is not running (start it with: devchooser daemon)");
    }
    ipc::send_request(request).await
}

/// Send a request that is answered with `Ok`/`Error` and print the outcome
async fn request_ok(req: Request) -> Result<()> {
    match request(req).await? {
        Response::Ok { message } => {
            println!("{}", message.success());
            Ok(())
        }
        Response::Error { message } => eyre::bail!("{message}"),
        _ => eyre::bail!("Unexpected response from daemon"),
    }
}

// ============================================================================
// Hybrid Commands (work with or without daemon)
// ============================================================================

/// Show the published selection and daemon status
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub async fn status(config: &Config, json_output: bool) -> Result<()> {
    // The published selection is readable without the daemon
    let published = match config.property_store_path() {
        Ok(path) => Publisher::new(Box::new(FileStore::new(path))).load(),
        Err(_) => Selection::default(),
    };

    let daemon_info = if ipc::is_daemon_running().await {
        match ipc::send_request(Request::Status).await {
            Ok(Response::Status {
                version,
                uptime_secs,
                selection,
                indicators,
            }) => Some((version, uptime_secs, selection, indicators)),
            _ => None,
        }
    } else {
        None
    };

    if json_output {
        let daemon_json = if let Some((version, uptime_secs, selection, indicators)) = &daemon_info {
            serde_json::json!({
                "running": true,
                "version": version,
                "uptime_secs": uptime_secs,
                "uptime_human": format_uptime(*uptime_secs),
                "selection": selection,
                "indicators": indicators,
            })
        } else {
            serde_json::json!({
                "running": false,
            })
        };

        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "published": published,
                "daemon": daemon_json,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Selection".header());
    println!("{}", "-".repeat(9));
    match &daemon_info {
        Some((_, _, _, indicators)) => {
            for info in indicators {
                println!("{} {}", format!("{}:", info.kind.title()).dim(), indicator_text(info));
            }
        }
        None => {
            for kind in Kind::ALL {
                let value = published
                    .requested(kind)
                    .map_or_else(|| "Default".dim().to_string(), |v| v.technical().to_string());
                println!("{} {}", format!("{}:", kind.title()).dim(), value);
            }
        }
    }

    println!();
    println!("{}", "Daemon".header());
    println!("{}", "-".repeat(6));
    if let Some((version, uptime_secs, _, _)) = daemon_info {
        println!(
            "{} {}",
            "Status:".dim(),
            format!("Running (uptime: {})", format_uptime(uptime_secs)).success()
        );
        println!("{} {}", "Version:".dim(), version);
    } else {
        println!("{} {}", "Status:".dim(), "Not running".error());
        println!("  Start with: {}", "devchooser daemon".technical());
    }

    Ok(())
}

// ============================================================================
// IPC-based Commands (require daemon)
// ============================================================================

/// List discovered records
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn list_devices(json_output: bool) -> Result<()> {
    let devices = match request(Request::ListDevices).await? {
        Response::Devices { devices } => devices,
        Response::Error { message } => eyre::bail!("{message}"),
        _ => eyre::bail!("Unexpected response from daemon"),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    for (i, kind) in Kind::ALL.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        let title = section_title(kind);
        println!("{}", title.header());
        println!("{}", "-".repeat(title.len()));

        let records: Vec<&DeviceInfo> = devices.iter().filter(|d| d.kind == kind).collect();
        if records.is_empty() {
            println!("  {}", "(none found)".dim());
            continue;
        }
        for record in records {
            let marker = if record.active { "* " } else { "  " };
            println!("{}{}", marker, record.name.as_str().bold());

            let location = match &record.device {
                Some(device) => format!("{} on {}", device, record.server),
                None => record.server.clone(),
            };
            println!("    {}", location.technical());
            if let Some(description) = &record.description {
                println!("    {}", description.as_str().dim());
            }
            if let Some(spec) = &record.sample_spec {
                println!("    {}", spec.as_str().dim());
            }
        }
    }
    println!("\n  {} = current selection", "*".dim());

    Ok(())
}

/// Select a discovered record by name
///
/// # Errors
/// Returns an error if no daemon is running or the record is unknown.
pub async fn select(kind: Kind, name: String) -> Result<()> {
    request_ok(Request::SelectRecord { kind, name }).await
}

/// Select a server by address (`None` = default)
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn set_server(server: Option<String>) -> Result<()> {
    request_ok(Request::SetServer { server }).await
}

/// Select a sink or source by device name (`None` = default)
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn set_device(kind: Kind, server: Option<String>, device: Option<String>) -> Result<()> {
    let req = match kind {
        Kind::Sink => Request::SetSink { server, device },
        Kind::Source => Request::SetSource { server, device },
        Kind::Server => eyre::bail!("Servers are selected with set-server"),
    };
    request_ok(req).await
}

/// Announce a record to the daemon, as a network browser would
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn announce(kind: Kind, name: String, args: AnnounceArgs) -> Result<()> {
    let sample_spec = match (args.format, args.rate, args.channels) {
        (Some(format), Some(rate), Some(channels)) => Some(SampleSpec {
            format,
            rate,
            channels,
        }),
        _ => None,
    };
    let event = DiscoveryEvent {
        op: Opcode::new_for(kind),
        name,
        server: args.server,
        device: args.device,
        description: args.description,
        sample_spec,
    };
    request_ok(Request::Announce { event }).await
}

/// Withdraw a record from the daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn withdraw(kind: Kind, name: String) -> Result<()> {
    request_ok(Request::Announce {
        event: DiscoveryEvent::removal(kind, name),
    })
    .await
}

/// Gracefully shutdown the daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn shutdown() -> Result<()> {
    request_ok(Request::Shutdown).await
}

// ============================================================================
// Local Commands (no daemon needed)
// ============================================================================

/// Toggle one notification flag in the config file.
///
/// A running daemon picks the change up by watching the file.
///
/// # Errors
/// Returns an error if the config cannot be loaded or saved.
pub fn notify(mut config: Config, target: NotifyTarget, enabled: bool) -> Result<()> {
    let label = match target {
        NotifyTarget::Server => {
            config.notifications.set_enabled(Kind::Server, enabled);
            "Server discovery notifications"
        }
        NotifyTarget::Sink => {
            config.notifications.set_enabled(Kind::Sink, enabled);
            "Sink discovery notifications"
        }
        NotifyTarget::Source => {
            config.notifications.set_enabled(Kind::Source, enabled);
            "Source discovery notifications"
        }
        NotifyTarget::Startup => {
            config.notifications.quiet_on_startup = enabled;
            "No notifications on startup"
        }
    };
    config.save()?;

    let state = if enabled { "on".success() } else { "off".warning() };
    println!("{label}: {state}");
    Ok(())
}

/// Enable, disable or query start on login
///
/// # Errors
/// Returns an error if the autostart entry cannot be written or removed.
pub fn autostart(action: AutostartAction) -> Result<()> {
    let entry = Autostart::user()?;
    match action {
        AutostartAction::Enable => {
            if entry.enable()? {
                println!("{}", "Start on login enabled".success());
            } else {
                println!("Start on login already enabled");
            }
        }
        AutostartAction::Disable => {
            if entry.disable()? {
                println!("{}", "Start on login disabled".success());
            } else {
                println!("Start on login already disabled");
            }
        }
        AutostartAction::Status => {
            let state = if entry.is_enabled() {
                "enabled".success()
            } else {
                "disabled".dim()
            };
            println!("Start on login: {state}");
        }
    }
    println!("{} {}", "Entry:".dim(), entry.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0s")]
    #[test_case(59, "59s")]
    #[test_case(60, "1m")]
    #[test_case(3600, "1h")]
    #[test_case(3660, "1h 1m")]
    fn test_format_uptime(secs: u64, expected: &str) {
        assert_eq!(format_uptime(secs), expected);
    }

    #[test]
    fn test_indicator_text_names_record_and_other_value() {
        let specific = IndicatorInfo {
            kind: Kind::Sink,
            state: IndicatorState::Specific,
            value: Some("Kitchen".to_string()),
        };
        assert!(indicator_text(&specific).contains("Kitchen"));

        let other = IndicatorInfo {
            kind: Kind::Sink,
            state: IndicatorState::Other,
            value: Some("typed".to_string()),
        };
        assert!(indicator_text(&other).contains("Other (typed)"));
    }
}
