//! `devchooser` - Network audio device chooser
//!
//! Keeps track of audio servers, sinks and sources announced on the local
//! network and lets the user pick the default ones. The choice is published
//! to a shared property store as `PULSE_SERVER`, `PULSE_SINK` and
//! `PULSE_SOURCE`, and every change (local or external) is reflected back
//! into a per-kind indicator: the matching discovered record, "Default",
//! or "Other".
//!
//! # Layout
//! - [`registry`], [`selection`], [`sync`], [`indicator`]: the engine
//! - [`notification`]: coalescing discovery notifications
//! - [`properties`]: the shared property store and publisher
//! - [`state`]: the application context wiring them together
//! - [`daemon`], [`ipc`], [`watch`], [`discovery`]: the event loop and its sources

pub mod autostart;
pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod discovery;
pub mod indicator;
pub mod ipc;
pub mod logging;
pub mod notification;
pub mod properties;
pub mod registry;
pub mod selection;
pub mod state;
pub mod style;
pub mod sync;
pub mod watch;

// Re-export commonly used types for convenience
pub use cli::Args;
pub use config::Config;
pub use state::State;
