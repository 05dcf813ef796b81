use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

/// Message type tags understood by the hub.
pub mod tags {
    /// Inbound: a chat line typed by a connected client.
    pub const SEND_MESSAGE: &str = "send_message";
    /// Outbound: a chat line re-broadcast to every connected client.
    pub const NEW_CHAT_MESSAGE: &str = "new_chat_message";
    /// Outbound: the image library changed on disk, clients should re-fetch it.
    pub const IMAGES_UPDATED: &str = "images_updated";
    /// Outbound: the asset tree changed on disk, clients should re-fetch it.
    pub const ASSETS_UPDATED: &str = "assets_updated";
}

/// Outbound, server-originated event.
///
/// Serialized as `{ "type": "<tag>", "payload": <payload> }`. The payload
/// defaults to a JSON value so producers that don't care about a concrete type
/// can build events on the fly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "P: Serialize", deserialize = "P: Deserialize<'de>"))]
pub struct Event<P = Value> {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: P,
}

impl<P> Event<P> {
    pub fn new(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

impl Event<Value> {
    /// An event whose only information is its tag, e.g. "re-fetch the image list".
    pub fn empty(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Value::Null)
    }
}

/// Inbound, client-originated message.
///
/// The payload is kept as raw JSON until the handler registered for
/// `message_type` decodes it into whatever shape it expects.
#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default = "null_payload")]
    pub payload: Box<RawValue>,
}

fn null_payload() -> Box<RawValue> {
    RawValue::NULL.to_owned()
}

/// Payload of a `send_message` message and of the `new_chat_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub content: String,
}
