//! Command-line interface definitions
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::registry::{Kind, SampleFormat};

/// devchooser - Network audio device chooser
///
/// Pick the default audio server, sink and source among devices announced
/// on the local network.
#[derive(Parser)]
#[command(name = "devchooser")]
#[command(version)]
#[command(about = "Network audio device chooser - pick the default server, sink and source among devices on the LAN")]
#[command(after_help = "\
BEHAVIOR:
  - The daemon keeps a registry of servers, sinks and sources announced on the network
  - The chosen server/sink/source is published as PULSE_SERVER, PULSE_SINK and PULSE_SOURCE
  - Each kind shows the discovered record matching the choice, \"Default\", or \"Other\"
  - Choosing a server resets sink and source; choosing a device on another server
    switches to that server
  - Discovery churn is coalesced into a single desktop notification

DAEMON MANAGEMENT:
  devchooser daemon                 Run the daemon, logging to the data dir
  devchooser daemon --foreground    Run with logs to stderr
  devchooser daemon --events -      Read JSON-lines discovery events from stdin
  devchooser status                 Current selection and daemon status (or just: devchooser)
  devchooser shutdown               Gracefully stop the daemon

SELECTION:
  devchooser list-devices           Discovered servers, sinks and sources
  devchooser select sink Kitchen    Use a discovered record
  devchooser set-server tcp:host    Use a server that was not discovered
  devchooser set-sink --default     Back to the server's default sink

DISCOVERY:
  devchooser announce sink Kitchen --server tcp:kitchen --device alsa_output.0
  devchooser withdraw sink Kitchen

SETTINGS:
  devchooser notify sink off        Toggle discovery notifications per kind
  devchooser notify startup on      No notifications during the startup scan
  devchooser autostart enable       Start on login
  devchooser validate               Validate config file (local, no daemon needed)

IPC SOCKET:
  $XDG_RUNTIME_DIR/devchooser.sock (or /tmp/devchooser-$UID.sock)")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Record kinds as command-line values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Server,
    Sink,
    Source,
}

impl From<KindArg> for Kind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Server => Kind::Server,
            KindArg::Sink => Kind::Sink,
            KindArg::Source => Kind::Source,
        }
    }
}

/// Which notification flag `notify` toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifyTarget {
    Server,
    Sink,
    Source,
    /// The "no notifications on startup" flag
    Startup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        toggle == Toggle::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AutostartAction {
    Enable,
    Disable,
    Status,
}

/// Fields of an announced record
#[derive(Debug, Clone, clap::Args)]
pub struct AnnounceArgs {
    /// Server address hosting the record
    #[arg(long)]
    pub server: String,

    /// Device name on the server (sinks and sources)
    #[arg(long)]
    pub device: Option<String>,

    /// Human-readable description
    #[arg(long)]
    pub description: Option<String>,

    /// Sample format (e.g. s16le)
    #[arg(long, requires = "rate")]
    pub format: Option<SampleFormat>,

    /// Sample rate in Hz
    #[arg(long, requires = "channels")]
    pub rate: Option<u32>,

    /// Channel count
    #[arg(long, requires = "format")]
    pub channels: Option<u8>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon (tracks discovered devices and publishes the selection)
    Daemon {
        /// Run in foreground with logs to stderr
        #[arg(short, long)]
        foreground: bool,

        /// JSON-lines discovery feed ("-" = stdin); overrides the config
        #[arg(long, value_name = "PATH")]
        events: Option<PathBuf>,
    },

    /// Show the current selection and daemon status
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Gracefully shutdown the daemon
    Shutdown,

    /// List discovered servers, sinks and sources
    #[command(alias = "list")]
    ListDevices {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Select a discovered record by name
    Select {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
    },

    /// Select a server by address
    SetServer {
        /// Server address (e.g. tcp:host:4713)
        #[arg(required_unless_present = "default")]
        address: Option<String>,

        /// Use the default server
        #[arg(long, conflicts_with = "address")]
        default: bool,
    },

    /// Select a sink by device name
    SetSink {
        /// Device name
        #[arg(required_unless_present = "default")]
        device: Option<String>,

        /// Server hosting the device (switches to it)
        #[arg(long, conflicts_with = "default")]
        server: Option<String>,

        /// Use the server's default sink
        #[arg(long, conflicts_with = "device")]
        default: bool,
    },

    /// Select a source by device name
    SetSource {
        /// Device name
        #[arg(required_unless_present = "default")]
        device: Option<String>,

        /// Server hosting the device (switches to it)
        #[arg(long, conflicts_with = "default")]
        server: Option<String>,

        /// Use the server's default source
        #[arg(long, conflicts_with = "device")]
        default: bool,
    },

    /// Announce a discovered record to the daemon
    Announce {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
        #[command(flatten)]
        record: AnnounceArgs,
    },

    /// Withdraw a previously announced record
    Withdraw {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
    },

    /// Turn discovery notifications on or off
    Notify {
        #[arg(value_enum)]
        target: NotifyTarget,
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Manage starting the daemon on login
    Autostart {
        #[arg(value_enum)]
        action: AutostartAction,
    },

    /// Validate config file (local, no daemon needed)
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_set_sink_default_conflicts_with_device() {
        assert!(Args::try_parse_from(["devchooser", "set-sink", "d1", "--default"]).is_err());
        assert!(Args::try_parse_from(["devchooser", "set-sink", "--default"]).is_ok());
        assert!(Args::try_parse_from(["devchooser", "set-sink"]).is_err());
    }

    #[test]
    fn test_announce_sample_spec_needs_all_parts() {
        let partial = Args::try_parse_from([
            "devchooser", "announce", "sink", "k", "--server", "tcp:k", "--format", "s16le",
        ]);
        assert!(partial.is_err());

        let full = Args::try_parse_from([
            "devchooser", "announce", "sink", "k", "--server", "tcp:k", "--format", "s16le",
            "--rate", "44100", "--channels", "2",
        ])
        .unwrap();
        match full.command {
            Some(Command::Announce { record, .. }) => {
                assert_eq!(record.format, Some(SampleFormat::S16Le));
            }
            _ => panic!("expected announce"),
        }
    }
}
