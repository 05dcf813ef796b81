use crate::error::Error;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A serialized outbound event. Encoded once per broadcast and shared by every
/// mailbox it is delivered to.
pub type Frame = Arc<str>;

/// Unique identifier for a client (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Waits for the next data frame. Returns `None` once the peer has closed
    /// the connection; control frames are never surfaced.
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, Error>>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    async fn send_frame(&mut self, frame: &str) -> Result<(), Error>;

    /// Closes the underlying transport. Called exactly once, when the write
    /// pump stops.
    async fn close(&mut self);
}

/// An established, message-framed duplex transport (e.g. an upgraded
/// WebSocket). The hub only needs to split it into independently owned
/// halves so both pumps can run concurrently.
pub trait Connection: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    /// Identity of the peer, used for logging.
    fn remote_addr(&self) -> String;

    fn split(self) -> (Self::Reader, Self::Writer);
}
