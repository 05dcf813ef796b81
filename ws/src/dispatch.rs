use crate::client::Client;
use async_trait::async_trait;
use events::{tags, ChatMessage, Event};
use log::*;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Handles one kind of inbound message.
///
/// `payload` is the raw JSON the client sent under `"payload"`; each handler
/// decodes it into its own shape.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &RawValue, client: &Client);
}

/// Maps message type tags to their handlers.
///
/// Built up front and handed to `Manager::new`, after which it can no longer
/// change.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handlers every hub in this application starts with.
    pub fn standard() -> Self {
        Self::new().with_handler(tags::SEND_MESSAGE, Arc::new(ChatMessageHandler))
    }

    /// Adds (or replaces) the handler for `tag`.
    pub fn with_handler(mut self, tag: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(tag.into(), handler);
        self
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers.get(tag)
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

/// `send_message`: log the chat line and echo it to every client as
/// `new_chat_message`, the sender included.
pub struct ChatMessageHandler;

#[async_trait]
impl MessageHandler for ChatMessageHandler {
    async fn handle(&self, payload: &RawValue, client: &Client) {
        let chat: ChatMessage = match serde_json::from_str(payload.get()) {
            Ok(chat) => chat,
            Err(e) => {
                warn!(
                    "Failed to decode chat message from client {}: {e}",
                    client.id()
                );
                return;
            }
        };

        info!(
            "Chat message received from {}: {}",
            chat.username, chat.content
        );

        if let Err(e) = client
            .manager()
            .broadcast(&Event::new(tags::NEW_CHAT_MESSAGE, chat))
        {
            error!("Failed to broadcast chat message: {e}");
        }
    }
}
