use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-supplied identity of a cached value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub segment: String,
    pub id: String,
}

impl CacheKey {
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            id: id.into(),
        }
    }
}

/// Flattened, encoded key used against the remote store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Record stored at a [`StorageKey`]: the cached item plus write metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<V> {
    pub item: V,
    /// Write time, milliseconds since the UNIX epoch.
    pub stored: u64,
    /// Time-to-live requested by the caller, in milliseconds.
    #[serde(default)]
    pub ttl: i64,
}

impl<V> Envelope<V> {
    pub fn new(item: V, stored: u64, ttl: i64) -> Self {
        Self { item, stored, ttl }
    }
}

/// Connection status reported by a remote store handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Created but `connect()` was never issued.
    Wait,
    Connecting,
    Connect,
    Ready,
    Reconnecting,
    Close,
    End,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Wait => "wait",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connect => "connect",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Close => "close",
            ConnectionStatus::End => "end",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(ConnectionStatus::Wait),
            "connecting" => Ok(ConnectionStatus::Connecting),
            "connect" => Ok(ConnectionStatus::Connect),
            "ready" => Ok(ConnectionStatus::Ready),
            "reconnecting" => Ok(ConnectionStatus::Reconnecting),
            "close" => Ok(ConnectionStatus::Close),
            "end" => Ok(ConnectionStatus::End),
            other => Err(format!("Unknown connection status: {other}")),
        }
    }
}

/// Adapter-level view of the connection lifecycle, derived from [`ConnectionStatus`].
///
/// There is no errored state here: a failed connect is reported once, as the
/// `Err` returned by `start()`, and the handle then shows whatever status its
/// driver settled on (usually `end`, which maps to `Closed`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Connecting,
    Ready,
    Closed,
}

impl From<ConnectionStatus> for LifecycleState {
    fn from(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Wait => LifecycleState::Uninitialized,
            ConnectionStatus::Connecting
            | ConnectionStatus::Connect
            | ConnectionStatus::Reconnecting => LifecycleState::Connecting,
            ConnectionStatus::Ready => LifecycleState::Ready,
            ConnectionStatus::Close | ConnectionStatus::End => LifecycleState::Closed,
        }
    }
}

/// Who is responsible for tearing the connection down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Injected by the caller; `stop()` leaves it open.
    Borrowed,
    /// Created for (or handed over to) the adapter; `stop()` disconnects it.
    Owned,
}
