//! Application state
//!
//! `State` is the single application context: registries, the selection,
//! the synchronizer, the notifier, the property publisher and the
//! indicator view. Everything runs on the daemon's event loop; the only
//! hazard is reentrancy from indicator side effects, which the
//! synchronizer phase guards against.

use tracing::{debug, info};

use crate::config::NotificationSettings;
use crate::discovery::DiscoveryEvent;
use crate::indicator::{ControlTable, Indicator, IndicatorInfo, IndicatorView};
use crate::notification::{NotificationId, Notifier};
use crate::properties::Publisher;
use crate::registry::{Kind, Registries};
use crate::selection::{Selection, SelectionRequest};
use crate::sync::Synchronizer;

/// Outcome of a selection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The selection changed and was published
    Changed,
    /// The request matched the current selection
    Unchanged,
    /// Dropped because a synchronization pass was running
    Suppressed,
}

/// Main application state for daemon mode
pub struct State<V: IndicatorView = ControlTable> {
    registries: Registries,
    selection: Selection,
    sync: Synchronizer,
    notifier: Notifier,
    publisher: Publisher,
    view: V,
}

impl<V: IndicatorView> State<V> {
    /// Create state with the selection currently found in the property store,
    /// and run an initial synchronization pass.
    #[must_use]
    pub fn new(publisher: Publisher, notifier: Notifier, view: V) -> Self {
        let selection = publisher.load();
        info!(
            "Initial selection: server={:?} sink={:?} source={:?}",
            selection.server, selection.sink, selection.source
        );

        let mut state = Self {
            registries: Registries::new(),
            selection,
            sync: Synchronizer::new(),
            notifier,
            publisher,
            view,
        };
        for kind in Kind::ALL {
            state.view.set_empty(kind, true);
        }
        state.synchronize();
        state
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    #[must_use]
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[must_use]
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    #[must_use]
    pub fn indicator(&self, kind: Kind) -> &Indicator {
        self.sync.indicator(kind)
    }

    /// Indicator snapshot of every kind, for status reporting
    #[must_use]
    pub fn indicator_infos(&self) -> Vec<IndicatorInfo> {
        Kind::ALL
            .iter()
            .map(|kind| self.sync.indicator(*kind).to_info(*kind))
            .collect()
    }

    /// Single entry point for selection changes.
    ///
    /// Ignored while a synchronization pass is running. Changes are written
    /// through to the property store (except externally observed ones), and
    /// every accepted request triggers a synchronization pass.
    pub fn set_selection(&mut self, request: SelectionRequest) -> SelectionOutcome {
        if self.sync.is_synchronizing() {
            debug!("Ignoring selection request during synchronization: {:?}", request);
            return SelectionOutcome::Suppressed;
        }

        let outcome = match self.selection.apply(&request) {
            Some(next) => {
                info!(
                    "Selection: server={:?} sink={:?} source={:?}",
                    next.server, next.sink, next.source
                );
                self.selection = next;
                if !request.is_external() {
                    self.publisher.publish(&self.selection);
                }
                SelectionOutcome::Changed
            }
            None => SelectionOutcome::Unchanged,
        };

        self.synchronize();
        outcome
    }

    /// Select a discovered record by name, as if its control was clicked.
    ///
    /// Returns `None` if no record of that name is known.
    pub fn select_record(&mut self, kind: Kind, name: &str) -> Option<SelectionOutcome> {
        let record = self.registries.get(kind).get(name)?;
        let request = match kind {
            Kind::Server => SelectionRequest::Server(Some(record.server.clone())),
            Kind::Sink => SelectionRequest::Sink {
                server: Some(record.server.clone()),
                device: record.device.clone(),
            },
            Kind::Source => SelectionRequest::Source {
                server: Some(record.server.clone()),
                device: record.device.clone(),
            },
        };
        Some(self.set_selection(request))
    }

    /// Adopt a selection observed in the property store (written by someone else)
    pub fn adopt_external(&mut self, observed: Selection) -> SelectionOutcome {
        self.set_selection(SelectionRequest::External(observed))
    }

    /// Apply one discovery event, then resynchronize
    pub fn handle_discovery(&mut self, event: DiscoveryEvent) {
        let kind = event.op.kind();

        if event.op.is_new() {
            let record = self.registries.get_mut(kind).insert(event.into_record());
            info!("Discovered {} '{}' on {}", kind, record.name, record.server);
            self.view.record_added(kind, &record);
            self.notifier.discovered(kind, &record);
        } else if let Some(record) = self.registries.get_mut(kind).remove(&event.name) {
            info!("Lost {} '{}'", kind, record.name);
            self.view.record_removed(kind, &record.name);
            self.notifier.disappeared(kind, &record.name);
        } else {
            debug!("Removal of unknown {} '{}' ignored", kind, event.name);
        }

        for kind in Kind::ALL {
            self.view.set_empty(kind, self.registries.get(kind).is_empty());
        }
        self.synchronize();
    }

    /// Apply notification settings changed at runtime
    pub fn apply_settings(&mut self, settings: NotificationSettings) {
        self.notifier.apply_settings(settings);
    }

    /// Forward a notification-closed report to the notifier
    pub fn notification_dismissed(&mut self, id: NotificationId) {
        self.notifier.dismissed(id);
    }

    /// Give up control of the shared properties
    pub fn relinquish(&mut self) {
        self.publisher.relinquish();
    }

    /// Recompute the indicators of all kinds (server, sink, source)
    pub fn synchronize(&mut self) {
        if !self.sync.begin() {
            debug!("Synchronization already running");
            return;
        }

        for kind in Kind::ALL {
            let emitted = self.sync.sync_kind(
                kind,
                self.registries.get(kind),
                &self.selection,
                &mut self.view,
            );
            for request in emitted {
                // Side effects of applying indicators, suppressed by the guard
                self.set_selection(request);
            }
        }

        self.sync.finish();
    }
}
