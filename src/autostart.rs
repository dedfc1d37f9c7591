//! Start on login
//!
//! Manages an XDG autostart entry that launches the daemon when the user
//! logs in.

use color_eyre::eyre::{Context, ContextCompat, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const ENTRY_NAME: &str = "devchooser.desktop";

const DESKTOP_ENTRY: &str = "[Desktop Entry]
Type=Application
Name=Network Audio Device Chooser
Comment=Choose the default audio server, sink and source among devices on the local network
Exec=devchooser daemon
Icon=audio-card
Terminal=false
Categories=AudioVideo;Audio;
X-GNOME-Autostart-enabled=true
";

/// Autostart entry in a given autostart directory
#[derive(Debug, Clone)]
pub struct Autostart {
    path: PathBuf,
}

impl Autostart {
    /// Entry in `dir`
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(ENTRY_NAME),
        }
    }

    /// Entry in the user's `$XDG_CONFIG_HOME/autostart`
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined.
    pub fn user() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("autostart");
        Ok(Self::in_dir(&dir))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An existing entry (file or symlink) counts as enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.path.symlink_metadata().is_ok()
    }

    /// Install the entry; an existing entry is left alone.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    /// Returns an error if the entry cannot be written.
    pub fn enable(&self) -> Result<bool> {
        if self.is_enabled() {
            return Ok(false);
        }
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create autostart dir: {dir:?}"))?;
        }
        fs::write(&self.path, DESKTOP_ENTRY)
            .with_context(|| format!("Failed to write autostart entry: {:?}", self.path))?;
        Ok(true)
    }

    /// Remove the entry; a missing entry is not an error.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    /// Returns an error if the entry exists but cannot be removed.
    pub fn disable(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove autostart entry: {:?}", self.path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Autostart::in_dir(&dir.path().join("autostart"));

        assert!(!entry.is_enabled());
        assert!(entry.enable().unwrap());
        assert!(entry.is_enabled());
        assert!(fs::read_to_string(entry.path()).unwrap().contains("Exec=devchooser daemon"));

        assert!(entry.disable().unwrap());
        assert!(!entry.is_enabled());
    }

    #[test]
    fn test_enable_twice_keeps_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Autostart::in_dir(dir.path());
        fs::write(entry.path(), "[Desktop Entry]\nExec=custom\n").unwrap();

        assert!(!entry.enable().unwrap());
        assert!(fs::read_to_string(entry.path()).unwrap().contains("Exec=custom"));
    }

    #[test]
    fn test_disable_missing_entry_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!Autostart::in_dir(dir.path()).disable().unwrap());
    }
}
