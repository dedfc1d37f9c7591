//! Configuration management
//!
//! Handles loading, parsing, validating and saving the TOML configuration
//! file. The notification flags double as the live settings store: the
//! daemon watches this file and applies changes while running.

use color_eyre::eyre::{self, Context, ContextCompat, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::registry::Kind;

/// Longest accepted startup quiet period
const MAX_QUIET_PERIOD_SECS: u64 = 3600;

// ============================================================================
// Public Configuration Types
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub settings: Settings,
}

/// Discovery notification flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub server_discovery: bool,
    pub sink_discovery: bool,
    pub source_discovery: bool,
    /// Suppress notifications for `quiet_period_secs` after startup
    pub quiet_on_startup: bool,
    pub quiet_period_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            server_discovery: true,
            sink_discovery: true,
            source_discovery: true,
            quiet_on_startup: true,
            quiet_period_secs: 5,
        }
    }
}

impl NotificationSettings {
    #[must_use]
    pub fn enabled_for(&self, kind: Kind) -> bool {
        match kind {
            Kind::Server => self.server_discovery,
            Kind::Sink => self.sink_discovery,
            Kind::Source => self.source_discovery,
        }
    }

    pub fn set_enabled(&mut self, kind: Kind, enabled: bool) {
        match kind {
            Kind::Server => self.server_discovery = enabled,
            Kind::Sink => self.sink_discovery = enabled,
            Kind::Source => self.source_discovery = enabled,
        }
    }

    /// The startup quiet period only matters if some discovery notification is on
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        Kind::ALL.iter().any(|kind| self.enabled_for(*kind))
    }
}

/// Global settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    /// Shared property store file (defaults to the runtime dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_store: Option<PathBuf>,
    /// JSON-lines discovery feed read by the daemon (`-` = stdin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            property_store: None,
            events: None,
        }
    }
}

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration from the default XDG config path
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, read, parsed or validated.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            info!("Creating default config at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        Self::load_from_path(&config_path)
    }

    /// Load and validate configuration from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {path:?}"))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {path:?}"))?;

        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a specific file
    ///
    /// # Errors
    /// Returns an error if validation, serialization or the write fails.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {parent:?}"))?;
        }
        fs::write(path, contents).with_context(|| format!("Failed to write config: {path:?}"))?;
        Ok(())
    }

    /// Save to the default XDG config path
    ///
    /// # Errors
    /// Returns an error if the path cannot be determined or the write fails.
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::get_config_path()?)
    }

    fn validate(&self) -> Result<()> {
        match self.settings.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => eyre::bail!(
                "Invalid log_level '{level}'. Must be: error, warn, info, debug, or trace"
            ),
        }

        if self.notifications.quiet_period_secs > MAX_QUIET_PERIOD_SECS {
            eyre::bail!(
                "quiet_period_secs is {} (max: {MAX_QUIET_PERIOD_SECS})",
                self.notifications.quiet_period_secs
            );
        }

        Ok(())
    }

    /// Get the XDG config path for devchooser
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined or created.
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("devchooser");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir: {config_dir:?}"))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Property store file: configured path or `$XDG_RUNTIME_DIR/devchooser/properties.json`
    ///
    /// # Errors
    /// Returns an error if no runtime or cache directory can be determined.
    pub fn property_store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.settings.property_store {
            return Ok(path.clone());
        }
        let base = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .context("Could not determine runtime directory for the property store")?;
        Ok(base.join("devchooser").join("properties.json"))
    }

    fn create_default_config(path: &Path) -> Result<()> {
        let default_config = r#"# devchooser (network audio device chooser) Configuration
#
# Picks the default audio server, sink and source among devices announced
# on the local network and publishes the choice as PULSE_SERVER,
# PULSE_SINK and PULSE_SOURCE.

[notifications]
server_discovery = true    # Notify when networked audio servers appear/disappear
sink_discovery = true      # Notify when networked sinks appear/disappear
source_discovery = true    # Notify when networked sources appear/disappear
quiet_on_startup = true    # No notifications during the initial network scan
quiet_period_secs = 5      # Length of that quiet period

[settings]
log_level = "info"         # error, warn, info, debug, trace
# property_store = "/run/user/1000/devchooser/properties.json"
# events = "-"             # JSON-lines discovery feed ("-" = stdin)
"#;
        fs::write(path, default_config)
            .with_context(|| format!("Failed to write config: {path:?}"))?;

        eprintln!("Created default config at: {path:?}");
        eprintln!();

        Ok(())
    }

    /// Print a human-readable summary of the configuration
    pub fn print_summary(&self) {
        println!("✓ Configuration valid\n");

        let n = &self.notifications;
        println!("Notifications:");
        println!("  server_discovery: {}", n.server_discovery);
        println!("  sink_discovery: {}", n.sink_discovery);
        println!("  source_discovery: {}", n.source_discovery);
        let quiet_note = if n.any_enabled() { "" } else { " (no discovery notifications enabled)" };
        println!("  quiet_on_startup: {}{}", n.quiet_on_startup, quiet_note);
        println!("  quiet_period_secs: {}", n.quiet_period_secs);

        println!("\nSettings:");
        println!("  log_level: {}", self.settings.log_level);
        match self.property_store_path() {
            Ok(path) => println!("  property_store: {path:?}"),
            Err(e) => println!("  property_store: unavailable ({e})"),
        }
        if let Some(ref events) = self.settings.events {
            println!("  events: {events:?}");
        }

        if let Ok(path) = Self::get_config_path() {
            println!("\nConfig: {path:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_notifications_section() {
        let config: Config = toml::from_str("[notifications]\nsink_discovery = false\n").unwrap();
        assert!(!config.notifications.sink_discovery);
        assert!(config.notifications.server_discovery);
        assert_eq!(config.notifications.quiet_period_secs, 5);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = Config::default();
        config.settings.log_level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log_level"));
    }

    #[test]
    fn test_quiet_period_bounded() {
        let mut config = Config::default();
        config.notifications.quiet_period_secs = MAX_QUIET_PERIOD_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_enabled_per_kind() {
        let mut n = NotificationSettings::default();
        for kind in Kind::ALL {
            n.set_enabled(kind, false);
            assert!(!n.enabled_for(kind));
        }
        assert!(!n.any_enabled());
        n.set_enabled(Kind::Source, true);
        assert!(n.any_enabled());
    }

    #[test]
    fn test_configured_property_store_path_wins() {
        let mut config = Config::default();
        config.settings.property_store = Some(PathBuf::from("/tmp/props.json"));
        assert_eq!(
            config.property_store_path().unwrap(),
            PathBuf::from("/tmp/props.json")
        );
    }
}
