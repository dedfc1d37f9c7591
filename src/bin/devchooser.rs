//! devchooser binary entry point
//!
//! Dispatches to daemon mode or subcommands based on CLI arguments.

use clap::Parser;
use color_eyre::eyre::Result;
use devchooser::cli::{Args, Command};
use devchooser::{commands, config::Config, daemon, logging, registry::Kind};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // The daemon initializes its own logging (file vs stderr)
    if !matches!(args.command, Some(Command::Daemon { .. })) {
        logging::init_cli();
    }

    match args.command {
        // No subcommand - show status
        None => {
            let config = Config::load()?;
            commands::status(&config, false).await
        }

        Some(Command::Daemon { foreground, events }) => {
            let config = Config::load()?;
            daemon::run(config, foreground, events).await
        }

        // Hybrid commands (work with or without daemon)
        Some(Command::Status { json }) => {
            let config = Config::load()?;
            commands::status(&config, json).await
        }

        // IPC-based commands (require daemon)
        Some(Command::Shutdown) => commands::shutdown().await,

        Some(Command::ListDevices { json }) => commands::list_devices(json).await,

        Some(Command::Select { kind, name }) => commands::select(kind.into(), name).await,

        Some(Command::SetServer { address, .. }) => commands::set_server(address).await,

        Some(Command::SetSink { device, server, .. }) => {
            commands::set_device(Kind::Sink, server, device).await
        }

        Some(Command::SetSource { device, server, .. }) => {
            commands::set_device(Kind::Source, server, device).await
        }

        Some(Command::Announce { kind, name, record }) => {
            commands::announce(kind.into(), name, record).await
        }

        Some(Command::Withdraw { kind, name }) => commands::withdraw(kind.into(), name).await,

        // Local commands (no daemon needed)
        Some(Command::Notify { target, state }) => {
            let config = Config::load()?;
            commands::notify(config, target, state.into())
        }

        Some(Command::Autostart { action }) => commands::autostart(action),

        Some(Command::Validate) => {
            let config = Config::load()?;
            config.print_summary();
            Ok(())
        }
    }
}
