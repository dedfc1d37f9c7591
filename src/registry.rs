//! Discovery registry
//!
//! Keeps one name-keyed table of announced records per kind (server, sink,
//! source). Records are shared as `Rc` so the synchronizer can hold weak
//! references to the currently matching one without owning it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::rc::Rc;

// ============================================================================
// Kinds
// ============================================================================

/// Category of an announced record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Server,
    Sink,
    Source,
}

impl Kind {
    /// All kinds, in synchronization order
    pub const ALL: [Kind; 3] = [Kind::Server, Kind::Sink, Kind::Source];

    /// Stable array index (server, sink, source)
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Kind::Server => 0,
            Kind::Sink => 1,
            Kind::Source => 2,
        }
    }

    /// Sinks and sources are devices living on a server; servers are not.
    #[must_use]
    pub const fn is_device(self) -> bool {
        !matches!(self, Kind::Server)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Server => "server",
            Kind::Sink => "sink",
            Kind::Source => "source",
        }
    }

    /// Capitalized noun used in notification titles
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Kind::Server => "Server",
            Kind::Sink => "Sink",
            Kind::Source => "Source",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sample specification
// ============================================================================

/// Sample format of an announced device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "u8")]
    U8,
    #[serde(rename = "aLaw")]
    ALaw,
    #[serde(rename = "uLaw")]
    ULaw,
    #[serde(rename = "s16le")]
    S16Le,
    #[serde(rename = "s16be")]
    S16Be,
    #[serde(rename = "float32le")]
    Float32Le,
    #[serde(rename = "float32be")]
    Float32Be,
    #[serde(rename = "s32le")]
    S32Le,
    #[serde(rename = "s32be")]
    S32Be,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 9] = [
        SampleFormat::U8,
        SampleFormat::ALaw,
        SampleFormat::ULaw,
        SampleFormat::S16Le,
        SampleFormat::S16Be,
        SampleFormat::Float32Le,
        SampleFormat::Float32Be,
        SampleFormat::S32Le,
        SampleFormat::S32Be,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::ALaw => "aLaw",
            SampleFormat::ULaw => "uLaw",
            SampleFormat::S16Le => "s16le",
            SampleFormat::S16Be => "s16be",
            SampleFormat::Float32Le => "float32le",
            SampleFormat::Float32Be => "float32be",
            SampleFormat::S32Le => "s32le",
            SampleFormat::S32Be => "s32be",
        }
    }
}

impl FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sample format '{s}'"))
    }
}

/// Audio format descriptor announced alongside sinks and sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u8,
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}ch {}Hz", self.format.as_str(), self.channels, self.rate)
    }
}

// ============================================================================
// Records
// ============================================================================

/// An announced server, sink or source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Unique key within its kind
    pub name: String,
    /// Address of the server hosting this record
    pub server: String,
    /// Device name on `server`; absent for server records
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sample_spec: Option<SampleSpec>,
}

impl DeviceRecord {
    /// Whether this record is the one a selection of `server` (+ `device`) points at
    #[must_use]
    pub fn matches(&self, server: &str, device: Option<&str>) -> bool {
        self.server == server
            && match device {
                Some(device) => self.device.as_deref() == Some(device),
                None => true,
            }
    }

    /// Human-readable multi-line summary (tooltips and discovery notifications)
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.device {
            None => format!("Name: {}\nServer: {}", self.name, self.server),
            Some(device) => format!(
                "Name: {}\nServer: {}\nDevice: {}\nDescription: {}\nSample Specification: {}",
                self.name,
                self.server,
                device,
                self.description.as_deref().unwrap_or("n/a"),
                self.sample_spec
                    .map_or_else(|| "n/a".to_string(), |spec| spec.to_string()),
            ),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name-keyed table of the records of one kind
#[derive(Debug)]
pub struct Registry {
    kind: Kind,
    records: HashMap<String, Rc<DeviceRecord>>,
}

impl Registry {
    #[must_use]
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            records: HashMap::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Insert a record, replacing any record with the same name
    pub fn insert(&mut self, record: DeviceRecord) -> Rc<DeviceRecord> {
        let record = Rc::new(record);
        self.records.insert(record.name.clone(), Rc::clone(&record));
        record
    }

    /// Remove a record by name; absent names are a no-op
    pub fn remove(&mut self, name: &str) -> Option<Rc<DeviceRecord>> {
        self.records.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rc<DeviceRecord>> {
        self.records.get(name)
    }

    /// First record satisfying `predicate`.
    ///
    /// Iteration order is unspecified: when several records satisfy the
    /// predicate, which one is returned is arbitrary.
    pub fn find<P>(&self, mut predicate: P) -> Option<&Rc<DeviceRecord>>
    where
        P: FnMut(&DeviceRecord) -> bool,
    {
        self.records.values().find(|record| predicate(record))
    }

    /// Number of distinct names present
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<DeviceRecord>> {
        self.records.values()
    }
}

/// The three per-kind registries
#[derive(Debug)]
pub struct Registries {
    tables: [Registry; 3],
}

impl Registries {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Kind::ALL.map(Registry::new),
        }
    }

    #[must_use]
    pub fn get(&self, kind: Kind) -> &Registry {
        &self.tables[kind.index()]
    }

    pub fn get_mut(&mut self, kind: Kind) -> &mut Registry {
        &mut self.tables[kind.index()]
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sink(name: &str, server: &str, device: &str) -> DeviceRecord {
        DeviceRecord {
            name: name.to_string(),
            server: server.to_string(),
            device: Some(device.to_string()),
            description: None,
            sample_spec: None,
        }
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut registry = Registry::new(Kind::Sink);
        registry.insert(sink("s1", "A", "d1"));
        registry.insert(sink("s1", "B", "d2"));

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("s1").unwrap().server, "B");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = Registry::new(Kind::Sink);
        registry.insert(sink("s1", "A", "d1"));

        assert!(registry.remove("s1").is_some());
        assert!(registry.remove("s1").is_none());
        assert!(registry.remove("never-seen").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_count_tracks_distinct_names() {
        let mut registry = Registry::new(Kind::Source);
        let ops: [(&str, bool); 7] = [
            ("a", true),
            ("b", true),
            ("a", true),
            ("c", true),
            ("b", false),
            ("b", false),
            ("z", false),
        ];
        let mut expected = std::collections::HashSet::new();
        for (name, insert) in ops {
            if insert {
                registry.insert(sink(name, "A", "d"));
                expected.insert(name);
            } else {
                registry.remove(name);
                expected.remove(name);
            }
            assert_eq!(registry.count(), expected.len());
        }
    }

    #[test]
    fn test_find_by_predicate() {
        let mut registry = Registry::new(Kind::Sink);
        registry.insert(sink("s1", "A", "d1"));
        registry.insert(sink("s2", "A", "d2"));

        let found = registry.find(|r| r.matches("A", Some("d2"))).unwrap();
        assert_eq!(found.name, "s2");
        assert!(registry.find(|r| r.matches("B", Some("d2"))).is_none());
    }

    #[test]
    fn test_server_record_matches_on_server_only() {
        let server = DeviceRecord {
            name: "srv".to_string(),
            server: "tcp:host".to_string(),
            device: None,
            description: None,
            sample_spec: None,
        };
        assert!(server.matches("tcp:host", None));
        assert!(!server.matches("tcp:other", None));
    }

    #[test_case(SampleFormat::S16Le, 44_100, 2, "s16le 2ch 44100Hz")]
    #[test_case(SampleFormat::Float32Be, 48_000, 6, "float32be 6ch 48000Hz")]
    #[test_case(SampleFormat::ULaw, 8_000, 1, "uLaw 1ch 8000Hz")]
    fn test_sample_spec_display(format: SampleFormat, rate: u32, channels: u8, expected: &str) {
        let spec = SampleSpec {
            format,
            rate,
            channels,
        };
        assert_eq!(spec.to_string(), expected);
    }

    #[test_case("s16le", SampleFormat::S16Le)]
    #[test_case("ALAW", SampleFormat::ALaw)]
    #[test_case("float32le", SampleFormat::Float32Le)]
    fn test_sample_format_from_str(input: &str, expected: SampleFormat) {
        assert_eq!(input.parse::<SampleFormat>(), Ok(expected));
    }

    #[test]
    fn test_sample_format_rejects_unknown() {
        assert!("s24le".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn test_summary_for_device_with_missing_fields() {
        let record = sink("Kitchen", "tcp:kitchen", "alsa_output.0");
        assert_eq!(
            record.summary(),
            "Name: Kitchen\nServer: tcp:kitchen\nDevice: alsa_output.0\nDescription: n/a\nSample Specification: n/a"
        );
    }

    #[test]
    fn test_summary_for_server() {
        let record = DeviceRecord {
            name: "studio".to_string(),
            server: "tcp:studio:4713".to_string(),
            device: None,
            description: Some("ignored for servers".to_string()),
            sample_spec: None,
        };
        assert_eq!(record.summary(), "Name: studio\nServer: tcp:studio:4713");
    }

    #[test]
    fn test_registries_are_independent_per_kind() {
        let mut registries = Registries::new();
        registries.get_mut(Kind::Sink).insert(sink("x", "A", "d"));

        assert_eq!(registries.get(Kind::Sink).count(), 1);
        assert!(registries.get(Kind::Source).is_empty());
        assert!(registries.get(Kind::Server).is_empty());
        assert_eq!(registries.get(Kind::Source).kind(), Kind::Source);
    }
}
