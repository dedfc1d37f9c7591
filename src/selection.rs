//! Persisted default-device selection
//!
//! The selection is three optional strings: the server, and the sink and
//! source device names on that server. A sink or source name only means
//! something relative to a server, so changing the server through a device
//! selection drops the other device.

use serde::{Deserialize, Serialize};

use crate::registry::Kind;

/// Current default server, sink and source (absent = use the default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub server: Option<String>,
    pub sink: Option<String>,
    pub source: Option<String>,
}

impl Selection {
    /// Selected device name for a device kind; `None` for servers
    #[must_use]
    pub fn device(&self, kind: Kind) -> Option<&str> {
        match kind {
            Kind::Server => None,
            Kind::Sink => self.sink.as_deref(),
            Kind::Source => self.source.as_deref(),
        }
    }

    /// The raw value requested for a kind: the server for servers, the device otherwise
    #[must_use]
    pub fn requested(&self, kind: Kind) -> Option<&str> {
        match kind {
            Kind::Server => self.server.as_deref(),
            Kind::Sink | Kind::Source => self.device(kind),
        }
    }

    /// Compute the selection resulting from `request`.
    ///
    /// Returns `None` when the request leaves the selection unchanged.
    #[must_use]
    pub fn apply(&self, request: &SelectionRequest) -> Option<Selection> {
        let next = match request {
            SelectionRequest::Server(server) => {
                if *server == self.server {
                    return None;
                }
                Selection {
                    server: server.clone(),
                    sink: None,
                    source: None,
                }
            }
            SelectionRequest::Sink { server, device } => match server {
                Some(_) => {
                    if *server == self.server && *device == self.sink {
                        return None;
                    }
                    Selection {
                        server: server.clone(),
                        sink: device.clone(),
                        source: self.keep_if_same_server(server, &self.source),
                    }
                }
                None => {
                    if *device == self.sink {
                        return None;
                    }
                    Selection {
                        sink: device.clone(),
                        ..self.clone()
                    }
                }
            },
            SelectionRequest::Source { server, device } => match server {
                Some(_) => {
                    if *server == self.server && *device == self.source {
                        return None;
                    }
                    Selection {
                        server: server.clone(),
                        sink: self.keep_if_same_server(server, &self.sink),
                        source: device.clone(),
                    }
                }
                None => {
                    if *device == self.source {
                        return None;
                    }
                    Selection {
                        source: device.clone(),
                        ..self.clone()
                    }
                }
            },
            SelectionRequest::External(observed) => {
                if observed == self {
                    return None;
                }
                observed.clone()
            }
        };
        Some(next)
    }

    fn keep_if_same_server(&self, server: &Option<String>, device: &Option<String>) -> Option<String> {
        if *server == self.server {
            device.clone()
        } else {
            None
        }
    }
}

/// A request to change the selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRequest {
    /// Select a server (`None` = default); clears sink and source
    Server(Option<String>),
    /// Select a sink. With a server, switches to that server; without one,
    /// only the sink name changes.
    Sink {
        server: Option<String>,
        device: Option<String>,
    },
    /// Select a source; same rules as `Sink`
    Source {
        server: Option<String>,
        device: Option<String>,
    },
    /// Adopt a selection observed in the shared property store
    External(Selection),
}

impl SelectionRequest {
    /// The "Default" choice for a kind
    #[must_use]
    pub fn default_for(kind: Kind) -> Self {
        match kind {
            Kind::Server => Self::Server(None),
            Kind::Sink => Self::Sink {
                server: None,
                device: None,
            },
            Kind::Source => Self::Source {
                server: None,
                device: None,
            },
        }
    }

    /// The "Other..." choice: a free-text value for a kind
    #[must_use]
    pub fn other(kind: Kind, value: String) -> Self {
        match kind {
            Kind::Server => Self::Server(Some(value)),
            Kind::Sink => Self::Sink {
                server: None,
                device: Some(value),
            },
            Kind::Source => Self::Source {
                server: None,
                device: Some(value),
            },
        }
    }

    /// Whether this request comes from outside (no write-back to the store)
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
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

    fn sink_req(server: Option<&str>, device: Option<&str>) -> SelectionRequest {
        SelectionRequest::Sink {
            server: server.map(String::from),
            device: device.map(String::from),
        }
    }

    fn source_req(server: Option<&str>, device: Option<&str>) -> SelectionRequest {
        SelectionRequest::Source {
            server: server.map(String::from),
            device: device.map(String::from),
        }
    }

    #[test]
    fn test_server_change_clears_devices() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        let next = current
            .apply(&SelectionRequest::Server(Some("B".to_string())))
            .unwrap();
        assert_eq!(next, sel(Some("B"), None, None));
    }

    #[test]
    fn test_same_server_is_unchanged() {
        let current = sel(Some("A"), Some("s1"), None);
        assert!(current
            .apply(&SelectionRequest::Server(Some("A".to_string())))
            .is_none());
    }

    #[test]
    fn test_sink_on_other_server_switches_server_and_clears_source() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        let next = current.apply(&sink_req(Some("B"), Some("s2"))).unwrap();
        assert_eq!(next, sel(Some("B"), Some("s2"), None));
    }

    #[test]
    fn test_sink_on_same_server_keeps_source() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        let next = current.apply(&sink_req(Some("A"), Some("s2"))).unwrap();
        assert_eq!(next, sel(Some("A"), Some("s2"), Some("m1")));
    }

    #[test]
    fn test_source_on_other_server_switches_server_and_clears_sink() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        let next = current.apply(&source_req(Some("B"), Some("m2"))).unwrap();
        assert_eq!(next, sel(Some("B"), None, Some("m2")));
    }

    #[test]
    fn test_sink_without_server_only_changes_sink() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        let next = current.apply(&sink_req(None, Some("typed"))).unwrap();
        assert_eq!(next, sel(Some("A"), Some("typed"), Some("m1")));
    }

    #[test]
    fn test_default_sink_clears_only_sink() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        let next = current
            .apply(&SelectionRequest::default_for(Kind::Sink))
            .unwrap();
        assert_eq!(next, sel(Some("A"), None, Some("m1")));
    }

    #[test]
    fn test_unchanged_device_request_is_noop() {
        let current = sel(Some("A"), Some("s1"), Some("m1"));
        assert!(current.apply(&sink_req(Some("A"), Some("s1"))).is_none());
        assert!(current.apply(&source_req(None, Some("m1"))).is_none());
    }

    #[test]
    fn test_external_replaces_everything() {
        let current = sel(Some("A"), Some("s1"), None);
        let observed = sel(Some("C"), None, Some("m3"));
        let next = current
            .apply(&SelectionRequest::External(observed.clone()))
            .unwrap();
        assert_eq!(next, observed);
        assert!(observed
            .apply(&SelectionRequest::External(observed.clone()))
            .is_none());
    }

    #[test]
    fn test_requested_value_per_kind() {
        let current = sel(Some("A"), Some("s1"), None);
        assert_eq!(current.requested(Kind::Server), Some("A"));
        assert_eq!(current.requested(Kind::Sink), Some("s1"));
        assert_eq!(current.requested(Kind::Source), None);
        assert_eq!(current.device(Kind::Server), None);
    }

    #[test]
    fn test_other_request_per_kind() {
        assert_eq!(
            SelectionRequest::other(Kind::Server, "tcp:x".to_string()),
            SelectionRequest::Server(Some("tcp:x".to_string()))
        );
        assert_eq!(
            SelectionRequest::other(Kind::Source, "mic".to_string()),
            source_req(None, Some("mic"))
        );
    }
}
