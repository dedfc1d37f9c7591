//! Indicator model
//!
//! Each kind is shown as an exclusive choice among the discovered records,
//! "Default" and "Other...". The synchronizer derives an [`Indicator`] per
//! kind and drives an [`IndicatorView`]; [`ControlTable`] is the in-process
//! view that status reporting reads from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::registry::{DeviceRecord, Kind};
use crate::selection::SelectionRequest;

/// Derived selection state of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indicator {
    /// The selection points at this discovered record
    Specific(Rc<DeviceRecord>),
    /// Nothing is requested
    Default,
    /// A value is requested but no discovered record matches it
    Other(String),
}

impl Indicator {
    #[must_use]
    pub fn record_name(&self) -> Option<&str> {
        match self {
            Indicator::Specific(record) => Some(record.name.as_str()),
            _ => None,
        }
    }

    /// Serializable snapshot for IPC
    #[must_use]
    pub fn to_info(&self, kind: Kind) -> IndicatorInfo {
        let (state, value) = match self {
            Indicator::Specific(record) => (IndicatorState::Specific, Some(record.name.clone())),
            Indicator::Default => (IndicatorState::Default, None),
            Indicator::Other(raw) => (IndicatorState::Other, Some(raw.clone())),
        };
        IndicatorInfo { kind, state, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorState {
    Specific,
    Default,
    Other,
}

/// Indicator as reported over IPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorInfo {
    pub kind: Kind,
    pub state: IndicatorState,
    /// Record name for `Specific`, raw requested value for `Other`
    pub value: Option<String>,
}

/// Identity of one choice control within a kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Control {
    Record(String),
    Default,
    Other,
}

/// Consumer of indicator updates.
///
/// `set_active` returns the selection request the control emits when
/// toggled, if any. Requests produced while a synchronization pass runs
/// are fed back to the selection entry point, which ignores them.
pub trait IndicatorView {
    fn record_added(&mut self, kind: Kind, record: &DeviceRecord);
    fn record_removed(&mut self, kind: Kind, name: &str);
    /// Show or hide the "no devices found" placeholder
    fn set_empty(&mut self, kind: Kind, empty: bool);
    fn set_active(&mut self, kind: Kind, control: &Control, active: bool) -> Option<SelectionRequest>;
    /// Raw value shown next to "Other..." (`None` clears it)
    fn set_other_hint(&mut self, kind: Kind, hint: Option<&str>);
}

/// Controls of a single kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindControls {
    /// Record name -> active
    pub records: BTreeMap<String, bool>,
    pub default: bool,
    pub other: bool,
    pub other_hint: Option<String>,
    pub empty: bool,
}

impl KindControls {
    /// Number of controls currently marked active
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records.values().filter(|active| **active).count()
            + usize::from(self.default)
            + usize::from(self.other)
    }

    /// The active control, if exactly one is active
    #[must_use]
    pub fn active(&self) -> Option<Control> {
        if self.active_count() != 1 {
            return None;
        }
        if self.default {
            return Some(Control::Default);
        }
        if self.other {
            return Some(Control::Other);
        }
        self.records
            .iter()
            .find(|(_, active)| **active)
            .map(|(name, _)| Control::Record(name.clone()))
    }
}

/// Typed map from control identity to its state, for every kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTable {
    kinds: [KindControls; 3],
}

impl ControlTable {
    #[must_use]
    pub fn new() -> Self {
        let empty = KindControls {
            empty: true,
            ..KindControls::default()
        };
        Self {
            kinds: [empty.clone(), empty.clone(), empty],
        }
    }

    #[must_use]
    pub fn controls(&self, kind: Kind) -> &KindControls {
        &self.kinds[kind.index()]
    }
}

impl Default for ControlTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorView for ControlTable {
    fn record_added(&mut self, kind: Kind, record: &DeviceRecord) {
        self.kinds[kind.index()]
            .records
            .insert(record.name.clone(), false);
    }

    fn record_removed(&mut self, kind: Kind, name: &str) {
        self.kinds[kind.index()].records.remove(name);
    }

    fn set_empty(&mut self, kind: Kind, empty: bool) {
        self.kinds[kind.index()].empty = empty;
    }

    fn set_active(&mut self, kind: Kind, control: &Control, active: bool) -> Option<SelectionRequest> {
        let controls = &mut self.kinds[kind.index()];
        match control {
            Control::Record(name) => {
                if let Some(flag) = controls.records.get_mut(name) {
                    *flag = active;
                }
            }
            Control::Default => controls.default = active,
            Control::Other => controls.other = active,
        }
        None
    }

    fn set_other_hint(&mut self, kind: Kind, hint: Option<&str>) {
        self.kinds[kind.index()].other_hint = hint.map(String::from);
    }
}
