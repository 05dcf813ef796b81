//! Error types for the `ws` crate.
//!
//! Follows the same layout as the other crates: a root `Error` holding an
//! `ErrorKind` and the optional underlying cause.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Kinds of failure the hub can run into.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// An outbound event could not be encoded; nothing was delivered.
    Serialization,
    /// An inbound frame was not a valid `{ "type", "payload" }` message.
    Decode,
    /// Reading from or writing to a client connection failed.
    Transport,
    /// The registry loop is no longer running.
    HubStopped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Hub error ({:?}): {source}", self.error_kind),
            None => write!(f, "Hub error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    pub fn new(error_kind: ErrorKind, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn serialization(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, err)
    }

    pub fn decode(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Decode, err)
    }

    /// Helper for transport failures reported by a connection implementation.
    pub fn transport(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(ErrorKind::Transport, source)
    }

    pub fn hub_stopped() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::HubStopped,
        }
    }
}
