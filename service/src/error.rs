//! Error types for the `service` crate.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ServiceErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ServiceErrorKind {
    /// The filesystem watcher could not be created or attached.
    Watcher,
    /// A directory the service depends on could not be prepared.
    Io,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Service error ({:?}): {source}", self.error_kind),
            None => write!(f, "Service error ({:?})", self.error_kind),
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

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ServiceErrorKind::Watcher,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ServiceErrorKind::Io,
        }
    }
}
