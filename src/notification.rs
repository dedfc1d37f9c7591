//! Discovery notifications
//!
//! Discovery churn is coalesced into one desktop notification: while a
//! notification is still open, new events are appended to its body instead
//! of opening another one. Dismissing the notification resets the log.

use color_eyre::eyre::{Context, Result};
use notify_rust::{Hint, Notification, Urgency};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::NotificationSettings;
use crate::registry::{DeviceRecord, Kind};

/// Identifier of an open notification on the surface
pub type NotificationId = u32;

/// Where notifications are displayed
pub trait NotificationSurface {
    /// Show a new notification and return its identifier
    ///
    /// # Errors
    /// Returns an error if the notification cannot be shown.
    fn open(&mut self, summary: &str, body: &str) -> Result<NotificationId>;

    /// Replace the content of an open notification
    ///
    /// # Errors
    /// Returns an error if the notification cannot be updated.
    fn update(&mut self, id: NotificationId, summary: &str, body: &str) -> Result<()>;
}

/// Coalescing notifier for discovery events
pub struct Notifier {
    surface: Box<dyn NotificationSurface>,
    settings: NotificationSettings,
    started_at: Instant,
    open: Option<NotificationId>,
    log: Option<String>,
}

impl Notifier {
    #[must_use]
    pub fn new(surface: Box<dyn NotificationSurface>, settings: NotificationSettings, started_at: Instant) -> Self {
        Self {
            surface,
            settings,
            started_at,
            open: None,
            log: None,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Apply settings changed at runtime
    pub fn apply_settings(&mut self, settings: NotificationSettings) {
        debug!("Notification settings updated: {:?}", settings);
        self.settings = settings;
    }

    /// Identifier of the notification currently open, if any
    #[must_use]
    pub fn open_notification(&self) -> Option<NotificationId> {
        self.open
    }

    /// Accumulated body of the open notification
    #[must_use]
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    /// Whether the startup quiet period currently suppresses notifications
    #[must_use]
    pub fn in_quiet_period(&self) -> bool {
        self.settings.quiet_on_startup
            && self.started_at.elapsed() <= Duration::from_secs(self.settings.quiet_period_secs)
    }

    /// A record of `kind` was announced
    pub fn discovered(&mut self, kind: Kind, record: &DeviceRecord) {
        if self.settings.enabled_for(kind) {
            let title = format!("Networked Audio {} Discovered", kind.title());
            self.emit(&title, &record.summary());
        }
    }

    /// A record of `kind` was withdrawn
    pub fn disappeared(&mut self, kind: Kind, name: &str) {
        if self.settings.enabled_for(kind) {
            let title = format!("Networked Audio {} Disappeared", kind.title());
            self.emit(&title, &format!("Name: {name}"));
        }
    }

    /// Show `title`/`body`, appending to the open notification if there is one
    pub fn emit(&mut self, title: &str, body: &str) {
        if self.in_quiet_period() {
            debug!("Startup quiet period, not notifying: {}", title);
            return;
        }

        match (self.open, self.log.as_deref()) {
            (Some(id), Some(previous)) => {
                let text = format!("{previous}\n\n{title}\n{body}");
                if let Err(e) = self.surface.update(id, title, &text) {
                    warn!("Notification update failed: {:#}", e);
                }
                self.log = Some(text);
            }
            _ => {
                let text = format!("{title}\n{body}");
                match self.surface.open(title, &text) {
                    Ok(id) => {
                        self.open = Some(id);
                        self.log = Some(text);
                    }
                    Err(e) => warn!("Notification failed: {:#}", e),
                }
            }
        }
    }

    /// The surface reports that notification `id` was closed
    pub fn dismissed(&mut self, id: NotificationId) {
        if self.open == Some(id) {
            debug!("Notification {} dismissed", id);
            self.open = None;
            self.log = None;
        }
    }
}

// ============================================================================
// Desktop notifications (freedesktop via notify-rust)
// ============================================================================

/// Desktop notification surface.
///
/// Every opened notification gets a watcher thread that reports its
/// closing on `closed_tx`.
pub struct DesktopSurface {
    closed_tx: mpsc::UnboundedSender<NotificationId>,
}

impl DesktopSurface {
    #[must_use]
    pub fn new(closed_tx: mpsc::UnboundedSender<NotificationId>) -> Self {
        Self { closed_tx }
    }

    fn build(summary: &str, body: &str) -> Notification {
        let mut notification = Notification::new();
        notification
            .summary(summary)
            .body(body)
            .appname("devchooser")
            .icon("audio-card")
            .hint(Hint::Category("device.added".to_string()))
            .urgency(Urgency::Low);
        notification
    }
}

impl NotificationSurface for DesktopSurface {
    fn open(&mut self, summary: &str, body: &str) -> Result<NotificationId> {
        let handle = Self::build(summary, body)
            .show()
            .context("Failed to show notification")?;
        let id = handle.id();

        let closed_tx = self.closed_tx.clone();
        std::thread::spawn(move || {
            handle.wait_for_action(|action| {
                if action == "__closed" {
                    let _ = closed_tx.send(id);
                }
            });
        });

        Ok(id)
    }

    fn update(&mut self, id: NotificationId, summary: &str, body: &str) -> Result<()> {
        Self::build(summary, body)
            .id(id)
            .show()
            .context("Failed to update notification")?;
        Ok(())
    }
}
