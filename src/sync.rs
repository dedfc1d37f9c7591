//! Selection synchronizer
//!
//! Maps the current selection onto the discovered records of each kind and
//! drives the indicator view. A pass covers server, sink and source in that
//! order. While it runs the synchronizer is in [`Phase::Synchronizing`];
//! selection changes arriving from indicator side effects during that time
//! must be dropped by the caller.

use std::rc::{Rc, Weak};
use tracing::{debug, trace};

use crate::indicator::{Control, Indicator, IndicatorView};
use crate::registry::{DeviceRecord, Kind, Registry};
use crate::selection::{Selection, SelectionRequest};

/// Guard state of the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Synchronizing,
}

/// Per-kind matching state
#[derive(Debug)]
pub struct Synchronizer {
    phase: Phase,
    /// Last matched record per kind. A hint only: revalidated every pass.
    matches: [Weak<DeviceRecord>; 3],
    indicators: [Indicator; 3],
    passes: u64,
}

impl Synchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            matches: [Weak::new(), Weak::new(), Weak::new()],
            indicators: [Indicator::Default, Indicator::Default, Indicator::Default],
            passes: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_synchronizing(&self) -> bool {
        self.phase == Phase::Synchronizing
    }

    /// Number of passes started so far
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Indicator derived for `kind` by the last pass
    #[must_use]
    pub fn indicator(&self, kind: Kind) -> &Indicator {
        &self.indicators[kind.index()]
    }

    /// Currently cached match for `kind`, if it is still alive
    #[must_use]
    pub fn cached_match(&self, kind: Kind) -> Option<Rc<DeviceRecord>> {
        self.matches[kind.index()].upgrade()
    }

    /// Enter the synchronizing phase.
    ///
    /// Returns `false` (and changes nothing) if a pass is already running.
    pub fn begin(&mut self) -> bool {
        if self.is_synchronizing() {
            return false;
        }
        self.phase = Phase::Synchronizing;
        self.passes += 1;
        trace!("Synchronization pass {} started", self.passes);
        true
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Recompute the indicator of one kind and apply it to `view`.
    ///
    /// Returns the selection requests the view emitted while being updated;
    /// they are side effects of this pass, not user intent.
    pub fn sync_kind(
        &mut self,
        kind: Kind,
        registry: &Registry,
        selection: &Selection,
        view: &mut dyn IndicatorView,
    ) -> Vec<SelectionRequest> {
        let slot = kind.index();
        let requested = selection.requested(kind);
        let found = self.lookup(kind, registry, selection);

        let indicator = match (&found, requested) {
            (Some(record), _) => Indicator::Specific(Rc::clone(record)),
            (None, Some(raw)) => Indicator::Other(raw.to_string()),
            (None, None) => Indicator::Default,
        };

        let mut emitted = Vec::new();

        // Everything that goes off does so before the new control goes on,
        // so no two controls of a kind are ever active together
        if let Some(old) = self.matches[slot].upgrade() {
            emitted.extend(view.set_active(kind, &Control::Record(old.name.clone()), false));
        }
        if !matches!(indicator, Indicator::Default) {
            emitted.extend(view.set_active(kind, &Control::Default, false));
        }
        if !matches!(indicator, Indicator::Other(_)) {
            emitted.extend(view.set_active(kind, &Control::Other, false));
            view.set_other_hint(kind, None);
        }

        self.matches[slot] = found.as_ref().map_or_else(Weak::new, Rc::downgrade);

        let target = match &indicator {
            Indicator::Specific(record) => Control::Record(record.name.clone()),
            Indicator::Default => Control::Default,
            Indicator::Other(raw) => {
                view.set_other_hint(kind, Some(raw));
                Control::Other
            }
        };
        emitted.extend(view.set_active(kind, &target, true));

        debug!("Indicator {}: {:?}", kind, indicator);
        self.indicators[slot] = indicator;
        emitted
    }

    /// Find the record matching the selection for `kind`
    fn lookup(&self, kind: Kind, registry: &Registry, selection: &Selection) -> Option<Rc<DeviceRecord>> {
        let server = selection.server.as_deref()?;
        let device = if kind.is_device() {
            Some(selection.device(kind)?)
        } else {
            None
        };

        // The last indicator may still hold a removed record alive
        if let Some(cached) = self.matches[kind.index()].upgrade()
            && registry
                .get(&cached.name)
                .is_some_and(|current| Rc::ptr_eq(current, &cached))
            && cached.matches(server, device)
        {
            trace!("Reusing cached {} match '{}'", kind, cached.name);
            return Some(cached);
        }

        registry
            .find(|record| record.matches(server, device))
            .map(Rc::clone)
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}
