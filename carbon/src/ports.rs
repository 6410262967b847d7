#![deny(clippy::all)]

use crate::domain::{CacheKey, ConnectionStatus, Envelope};
use async_trait::async_trait;
use shared::{Result, TtlMs};

// Ports are the pluggable extension points on either side of the adapter

/// Port for the remote key-value store the adapter talks to.
///
/// Implementors report driver failures as `Error::Transport`; the adapter
/// passes them through untouched.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    fn status(&self) -> ConnectionStatus;
    async fn connect(&self) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Write `value` with an expiry in whole seconds.
    async fn set_ex(&self, key: &str, value: String, expiry_secs: u64) -> Result<()>;
    /// Returns the number of keys removed.
    async fn del(&self, key: &str) -> Result<u64>;
    async fn disconnect(&self) -> Result<()>;
}

/// Uniform cache-storage contract consumed by the caching façade
#[async_trait]
pub trait CacheStore<V>: Send + Sync + 'static {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    fn is_ready(&self) -> bool;
    fn validate_segment_name(&self, name: &str) -> Result<()>;
    async fn get(&self, key: Option<&CacheKey>) -> Result<Option<Envelope<V>>>;
    async fn set(&self, key: &CacheKey, value: V, ttl: TtlMs) -> Result<()>;
    async fn drop(&self, key: &CacheKey) -> Result<()>;
}
