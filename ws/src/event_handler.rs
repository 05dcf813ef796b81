use crate::Manager;
use async_trait::async_trait;
use events::{Event, EventHandler};
use log::*;

/// Forwards events announced by producers (directory watchers, CRUD
/// handlers) to every connected client.
pub struct HubEventHandler {
    manager: Manager,
}

impl HubEventHandler {
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &Event) {
        debug!("Forwarding {} event to connected clients", event.event_type);

        if let Err(e) = self.manager.broadcast(event) {
            error!("Failed to broadcast {} event: {e}", event.event_type);
        }
    }
}
