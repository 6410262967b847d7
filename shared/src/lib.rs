// shared/src/lib.rs

use std::sync::Arc;

/// Boxed error raised by a remote store driver, shared so it can be cloned
/// across callers awaiting the same connect attempt.
pub type TransportError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("not connected")]
    NotConnected,
    #[error("{0}")]
    Validation(String),
    #[error("invalid cache key: {0}")]
    InvalidKey(String),
    #[error("Bad envelope content")]
    BadEnvelope,
    #[error("Incorrect envelope structure")]
    EnvelopeStructure,
    #[error(transparent)]
    Serialization(Arc<serde_json::Error>),
    #[error("{0}")]
    Transport(TransportError),
}

impl Error {
    /// Wrap a driver error without altering its message.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Arc::new(err))
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::NotConnected)
    }

    /// The original driver error, for callers that need to downcast it.
    pub fn transport_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live in milliseconds. Zero or negative means "do not cache".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub i64);

impl TtlMs {
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Expiry handed to the remote store, in whole seconds and never below one.
    pub fn expiry_secs(&self) -> u64 {
        (self.0 / 1000).max(1) as u64
    }
}

pub mod config;
