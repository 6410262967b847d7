use async_trait::async_trait;
use carbon::domain::ConnectionStatus;
use carbon::ports::RemoteStore;
use moka::Expiry;
use moka::future::Cache;
use shared::{Error, Result};
use std::fmt::Debug;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
struct StoredValue {
    value: String,
    expiry: Duration,
}

/// Expires each entry after the duration it was written with, like `SET key value EX n`.
struct WriteExpiry;

impl Expiry<String, StoredValue> for WriteExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expiry)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expiry)
    }
}

/// Counters of calls that reached the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub connects: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

#[derive(Default)]
struct Counters {
    connects: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

/// In-process remote store backed by Moka with per-entry expiry
///
/// Behaves like a freshly created network client: it starts in `wait` and
/// only serves requests once `connect()` has brought it to `ready`.
pub struct MemoryStore {
    entries: Cache<String, StoredValue>,
    status: watch::Sender<ConnectionStatus>,
    connect_delay: Option<Duration>,
    refuse_connections: bool,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Wait);

        Self {
            entries: Cache::builder().expire_after(WriteExpiry).build(),
            status,
            connect_delay: None,
            refuse_connections: false,
            counters: Counters::default(),
        }
    }

    /// Create a bounded store holding at most `max_entries` keys
    pub fn new_bounded(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(WriteExpiry)
                .build(),
            ..Self::new()
        }
    }

    /// Simulate network latency on `connect()`.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Make every `connect()` fail as if the server were unreachable.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Watch status transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            connects: self.counters.connects.load(Ordering::SeqCst),
            reads: self.counters.reads.load(Ordering::SeqCst),
            writes: self.counters.writes.load(Ordering::SeqCst),
            deletes: self.counters.deletes.load(Ordering::SeqCst),
        }
    }

    /// Expiry the key was last written with, if it is still present.
    pub async fn expiry_of(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).await.map(|stored| stored.expiry)
    }

    /// Raw content under `key`, bypassing the connection state.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).await.map(|stored| stored.value)
    }

    /// Write raw content directly, bypassing the connection state.
    pub async fn insert_raw(&self, key: &str, value: impl Into<String>, expiry: Duration) {
        let stored = StoredValue {
            value: value.into(),
            expiry,
        };
        self.entries.insert(key.to_string(), stored).await;
    }

    fn transition(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        debug!("MemoryStore status {} -> {}", previous, status);
    }

    fn ensure_ready(&self) -> Result<()> {
        if *self.status.borrow() == ConnectionStatus::Ready {
            Ok(())
        } else {
            Err(Error::transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "Connection is closed.",
            )))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    async fn connect(&self) -> Result<()> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.transition(ConnectionStatus::Connecting);

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        if self.refuse_connections {
            warn!("MemoryStore refused connection");
            self.transition(ConnectionStatus::End);
            return Err(Error::transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connect ECONNREFUSED",
            )));
        }

        self.transition(ConnectionStatus::Connect);
        self.transition(ConnectionStatus::Ready);
        info!("MemoryStore ready");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_ready()?;
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.get(key).await.map(|stored| stored.value))
    }

    async fn set_ex(&self, key: &str, value: String, expiry_secs: u64) -> Result<()> {
        self.ensure_ready()?;
        if expiry_secs == 0 {
            return Err(Error::transport(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ERR invalid expire time in 'set' command",
            )));
        }

        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        let stored = StoredValue {
            value,
            expiry: Duration::from_secs(expiry_secs),
        };
        self.entries.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<u64> {
        self.ensure_ready()?;
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.remove(key).await.map_or(0, |_| 1))
    }

    async fn disconnect(&self) -> Result<()> {
        self.transition(ConnectionStatus::Close);
        self.transition(ConnectionStatus::End);
        info!("MemoryStore disconnected");
        Ok(())
    }
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("status", &*self.status.borrow())
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}
