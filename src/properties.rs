//! Shared property store
//!
//! The selection is mirrored into a process-shared key/value store under
//! the conventional `PULSE_SERVER`, `PULSE_SINK` and `PULSE_SOURCE` keys so
//! other audio clients agree on the same defaults. `PULSE_ID` is the
//! sentinel of whoever published the keys last; deleting it tells that
//! publisher it is no longer in control.

use color_eyre::eyre::{Context, ContextCompat, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::selection::Selection;

/// Keys of the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Server,
    Sink,
    Source,
    /// Sentinel of the publisher in control
    Id,
}

impl PropertyKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PropertyKey::Server => "PULSE_SERVER",
            PropertyKey::Sink => "PULSE_SINK",
            PropertyKey::Source => "PULSE_SOURCE",
            PropertyKey::Id => "PULSE_ID",
        }
    }
}

/// Typed access to the shared store
pub trait PropertyStore {
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn get(&self, key: PropertyKey) -> Result<Option<String>>;

    /// # Errors
    /// Returns an error if the store cannot be written.
    fn set(&mut self, key: PropertyKey, value: &str) -> Result<()>;

    /// Deleting an absent key succeeds.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    fn delete(&mut self, key: PropertyKey) -> Result<()>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Store kept as a JSON object in a file; a missing file has no keys
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read property store: {:?}", self.path))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse property store: {:?}", self.path))
    }

    /// Replace the file atomically so readers never see a partial write
    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("Property store path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create property store dir: {dir:?}"))?;

        let json = serde_json::to_vec_pretty(values).context("Failed to serialize properties")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {dir:?}"))?;
        tmp.write_all(&json)
            .context("Failed to write property store")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace property store: {:?}", self.path))?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let mut values = self.read_all()?;
        if f(&mut values) {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

impl PropertyStore for FileStore {
    fn get(&self, key: PropertyKey) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key.as_str()))
    }

    fn set(&mut self, key: PropertyKey, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.as_str().to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn delete(&mut self, key: PropertyKey) -> Result<()> {
        self.modify(|values| values.remove(key.as_str()).is_some())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store living in this process only
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<PropertyKey, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryStore {
    fn get(&self, key: PropertyKey) -> Result<Option<String>> {
        Ok(self.values.get(&key).cloned())
    }

    fn set(&mut self, key: PropertyKey, value: &str) -> Result<()> {
        self.values.insert(key, value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: PropertyKey) -> Result<()> {
        self.values.remove(&key);
        Ok(())
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Mirrors the selection into a property store
pub struct Publisher {
    store: Box<dyn PropertyStore>,
}

impl Publisher {
    #[must_use]
    pub fn new(store: Box<dyn PropertyStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &dyn PropertyStore {
        self.store.as_ref()
    }

    /// Read the selection currently published in the store.
    ///
    /// # Errors
    /// Returns an error if any key cannot be read; nothing is guessed.
    pub fn try_load(&self) -> Result<Selection> {
        Ok(Selection {
            server: self.store.get(PropertyKey::Server)?,
            sink: self.store.get(PropertyKey::Sink)?,
            source: self.store.get(PropertyKey::Source)?,
        })
    }

    /// Startup variant of [`Publisher::try_load`].
    ///
    /// Unreadable keys are logged and treated as absent.
    #[must_use]
    pub fn load(&self) -> Selection {
        let read = |key: PropertyKey| match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not read {}: {:#}", key.as_str(), e);
                None
            }
        };
        Selection {
            server: read(PropertyKey::Server),
            sink: read(PropertyKey::Sink),
            source: read(PropertyKey::Source),
        }
    }

    /// Publish `selection` and take control by deleting the sentinel.
    ///
    /// Failures are logged; the in-process selection stays authoritative.
    pub fn publish(&mut self, selection: &Selection) {
        let fields = [
            (PropertyKey::Server, selection.server.as_deref()),
            (PropertyKey::Sink, selection.sink.as_deref()),
            (PropertyKey::Source, selection.source.as_deref()),
        ];
        for (key, value) in fields {
            let result = match value {
                Some(value) => self.store.set(key, value),
                None => self.store.delete(key),
            };
            if let Err(e) = result {
                warn!("Could not publish {}: {:#}", key.as_str(), e);
            }
        }
        self.delete_sentinel();
        debug!("Published selection: {:?}", selection);
    }

    /// Delete the sentinel when shutting down
    pub fn relinquish(&mut self) {
        self.delete_sentinel();
    }

    fn delete_sentinel(&mut self) {
        if let Err(e) = self.store.delete(PropertyKey::Id) {
            warn!("Could not delete {}: {:#}", PropertyKey::Id.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sel(server: Option<&str>, sink: Option<&str>, source: Option<&str>) -> Selection {
        Selection {
            server: server.map(String::from),
            sink: sink.map(String::from),
            source: source.map(String::from),
        }
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("props.json"));
        assert_eq!(store.get(PropertyKey::Server).unwrap(), None);
    }

    #[test]
    fn test_file_store_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested").join("props.json"));

        store.set(PropertyKey::Sink, "alsa_output.0").unwrap();
        assert_eq!(
            store.get(PropertyKey::Sink).unwrap().as_deref(),
            Some("alsa_output.0")
        );

        store.delete(PropertyKey::Sink).unwrap();
        store.delete(PropertyKey::Sink).unwrap();
        assert_eq!(store.get(PropertyKey::Sink).unwrap(), None);
    }

    #[test]
    fn test_file_store_uses_conventional_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props.json");
        let mut store = FileStore::new(&path);
        store.set(PropertyKey::Server, "tcp:studio").unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("PULSE_SERVER").map(String::as_str), Some("tcp:studio"));
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props.json");
        fs::write(&path, "not json").unwrap();
        assert!(FileStore::new(&path).get(PropertyKey::Server).is_err());
    }

    #[test]
    fn test_publish_round_trip() {
        let mut publisher = Publisher::new(Box::new(MemoryStore::new()));
        let selection = sel(Some("tcp:A"), Some("s1"), None);

        publisher.publish(&selection);
        assert_eq!(publisher.load(), selection);
        assert_eq!(publisher.store().get(PropertyKey::Source).unwrap(), None);
    }

    #[test]
    fn test_publish_deletes_cleared_fields_and_sentinel() {
        let mut store = MemoryStore::new();
        store.set(PropertyKey::Server, "tcp:old").unwrap();
        store.set(PropertyKey::Sink, "old-sink").unwrap();
        store.set(PropertyKey::Id, "4242@otherhost").unwrap();
        let mut publisher = Publisher::new(Box::new(store));

        publisher.publish(&Selection::default());

        assert_eq!(publisher.load(), Selection::default());
        assert_eq!(publisher.store().get(PropertyKey::Id).unwrap(), None);
    }

    #[test]
    fn test_load_treats_unreadable_store_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props.json");
        fs::write(&path, "{broken").unwrap();
        let publisher = Publisher::new(Box::new(FileStore::new(&path)));
        assert_eq!(publisher.load(), Selection::default());
    }

    #[test]
    fn test_try_load_reports_unreadable_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props.json");
        let mut store = FileStore::new(&path);
        store.set(PropertyKey::Server, "tcp:A").unwrap();
        let publisher = Publisher::new(Box::new(store));
        assert_eq!(publisher.try_load().unwrap(), sel(Some("tcp:A"), None, None));

        fs::write(&path, r#"{"PULSE_SERVER": "tcp:B""#).unwrap();
        assert!(publisher.try_load().is_err());
    }
}
