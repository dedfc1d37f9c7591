//! File watching for the settings file and the shared property store
//!
//! Both files may be replaced atomically (rename over), so the parent
//! directories are watched and events are filtered by path.

use color_eyre::eyre::{Context, ContextCompat, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Which watched file changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Config,
    Properties,
}

/// Keeps the underlying watcher alive; events stop when dropped
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

fn classify(event: &Event, targets: &[(PathBuf, WatchEvent)]) -> Vec<WatchEvent> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for path in &event.paths {
        for (target, kind) in targets {
            if path.file_name() == target.file_name() && !hits.contains(kind) {
                hits.push(*kind);
            }
        }
    }
    hits
}

/// Start watching `config_path` and `property_path`.
///
/// # Errors
/// Returns an error if a parent directory cannot be created or watched.
pub fn spawn(config_path: &Path, property_path: &Path) -> Result<(FileWatcher, mpsc::UnboundedReceiver<WatchEvent>)> {
    let targets = vec![
        (config_path.to_path_buf(), WatchEvent::Config),
        (property_path.to_path_buf(), WatchEvent::Properties),
    ];

    let mut dirs: Vec<PathBuf> = Vec::new();
    for (target, _) in &targets {
        let dir = target
            .parent()
            .with_context(|| format!("Watched file has no parent directory: {}", target.display()))?
            .to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let handler_targets = targets.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for hit in classify(&event, &handler_targets) {
                let _ = tx.send(hit);
            }
        }
        Err(e) => warn!("File watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    for dir in &dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;
        debug!("Watching {}", dir.display());
    }

    Ok((FileWatcher { _watcher: watcher }, rx))
}
