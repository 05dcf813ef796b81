use crate::error::Error;
use events::{Event, EventPublisher};
use log::*;
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Announces changes to a directory's contents to connected clients.
///
/// Whenever a file is created, removed or renamed directly inside the watched
/// directory, an empty event tagged `event_type` is published so clients know
/// to re-fetch the corresponding list. Watching stops when this value is
/// dropped.
pub struct DirWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
    listener: JoinHandle<()>,
}

impl DirWatcher {
    /// Starts watching `dir`, creating it first if it doesn't exist.
    pub fn start(
        dir: impl AsRef<Path>,
        event_type: &'static str,
        publisher: EventPublisher,
    ) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        // notify calls back on its own thread; hop onto the runtime from there.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let watched = dir.clone();
        let listener = tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                match res {
                    Ok(event) if is_listing_change(&event.kind) => {
                        info!(
                            "Detected change in {}: {:?}, publishing {event_type}",
                            watched.display(),
                            event.paths
                        );
                        publisher.publish(Event::empty(event_type)).await;
                    }
                    Ok(event) => trace!("Ignoring {:?} in {}", event.kind, watched.display()),
                    Err(e) => error!("File watcher error in {}: {e}", watched.display()),
                }
            }
        });

        info!("Watching {} for changes ({event_type})", dir.display());

        Ok(Self {
            dir,
            _watcher: watcher,
            listener,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Only changes to which files exist matter to clients; content edits don't.
fn is_listing_change(kind: &EventKind) -> bool {
    kind.is_create() || kind.is_remove() || matches!(kind, EventKind::Modify(ModifyKind::Name(_)))
}
