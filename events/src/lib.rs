//! Event model and producer seam for the campaign backend.
//!
//! This crate provides the types shared by everything that talks to the
//! real-time hub, without depending on the hub itself.
//!
//! # Architecture
//!
//! - **Event / Message**: the JSON frames exchanged with connected clients,
//!   `{ "type": ..., "payload": ... }` in both directions
//! - **EventHandler**: Trait implemented by whatever delivers events (the hub)
//! - **EventPublisher**: Handed to producers (directory watchers, CRUD
//!   handlers) so they can announce changes
//!
//! Producers depend on this crate only, which keeps the hub crate free of
//! filesystem or persistence concerns.

use async_trait::async_trait;
use std::sync::Arc;

pub mod message;

pub use message::{tags, ChatMessage, Event, Message};

/// Trait for handling events announced by producers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}

/// Publishes events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: Event) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
