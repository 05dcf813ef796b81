use config::Config;
use events::{tags, EventPublisher};
use log::info;
use std::sync::Arc;
use watcher::DirWatcher;
use ws::{DispatchTable, HubEventHandler, Manager};

pub mod config;
pub mod error;
pub mod logging;
pub mod watcher;

// Service-level state shared with the web layer.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Manager,
    pub publisher: EventPublisher,
}

impl AppState {
    /// Builds the real-time hub and the publisher producers announce changes
    /// through. Must be called from within the tokio runtime.
    pub fn new(app_config: Config) -> Self {
        let hub = Manager::new(DispatchTable::standard(), app_config.mailbox_capacity());
        let publisher =
            EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone())));

        Self {
            config: app_config,
            hub,
            publisher,
        }
    }
}

/// Starts the asset directory watchers when enabled. The returned watchers
/// must be kept alive for as long as notifications are wanted.
pub fn start_watchers(app_state: &AppState) -> Result<Vec<DirWatcher>, error::Error> {
    if !app_state.config.watch_assets {
        info!("Asset directory watching is disabled");
        return Ok(Vec::new());
    }

    let images = DirWatcher::start(
        app_state.config.images_path(),
        tags::IMAGES_UPDATED,
        app_state.publisher.clone(),
    )?;
    let assets = DirWatcher::start(
        app_state.config.assets_path(),
        tags::ASSETS_UPDATED,
        app_state.publisher.clone(),
    )?;

    Ok(vec![images, assets])
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("campaign_hub").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn app_state_starts_an_empty_hub() {
        let state = AppState::new(config(&["--mailbox-capacity", "4"]));
        assert_eq!(state.hub.client_count().await.unwrap(), 0);
        assert_eq!(state.publisher.handler_count(), 1);
    }

    #[tokio::test]
    async fn watchers_are_skipped_when_disabled() {
        let state = AppState::new(config(&["--watch-assets", "false"]));
        assert!(start_watchers(&state).unwrap().is_empty());
    }

    #[tokio::test]
    async fn watchers_cover_images_and_assets() {
        let root = tempfile::tempdir().unwrap();
        let root_arg = root.path().to_string_lossy().to_string();
        let state = AppState::new(config(&["--assets-path", root_arg.as_str()]));

        let watchers = start_watchers(&state).unwrap();

        let dirs: Vec<_> = watchers.iter().map(|w| w.dir().to_path_buf()).collect();
        assert_eq!(dirs, vec![root.path().join("images"), root.path().to_path_buf()]);
    }
}
