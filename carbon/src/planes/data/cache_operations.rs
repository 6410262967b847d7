use crate::domain::{CacheKey, Envelope, LifecycleState, Ownership};
use crate::envelope;
use crate::keys::{self, KeyGenerator};
use crate::planes::control::Connection;
use crate::ports::{CacheStore, RemoteStore};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::config::AdapterConfig;
use shared::{Result, TtlMs};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// Cache adapter over a remote key-value store
///
/// Stores values of type `V` as JSON envelopes under keys derived from
/// `{segment, id}` pairs. All operations are gated on the connection being
/// ready; store failures pass through untouched.
pub struct RemoteCacheAdapter<S, V>
where
    S: RemoteStore,
{
    connection: Connection<S>,
    keys: KeyGenerator,
    _item: PhantomData<fn() -> V>,
}

impl<S, V> RemoteCacheAdapter<S, V>
where
    S: RemoteStore,
{
    /// Adapter over a caller-owned handle; `stop()` will not close it.
    pub fn new(client: Arc<S>, partition: Option<String>) -> Self {
        Self::from_parts(Connection::borrowed(client), partition)
    }

    /// Adapter that takes ownership of the handle and closes it on `stop()`.
    pub fn owning(client: S, partition: Option<String>) -> Self {
        Self::from_parts(Connection::owned(client), partition)
    }

    /// Adapter that creates its own handle from `S::default()`.
    pub fn from_config(config: &AdapterConfig) -> Self
    where
        S: Default,
    {
        Self::owning(S::default(), config.partition.clone())
    }

    fn from_parts(connection: Connection<S>, partition: Option<String>) -> Self {
        Self {
            connection,
            keys: KeyGenerator::new(partition),
            _item: PhantomData,
        }
    }

    pub fn client(&self) -> &Arc<S> {
        self.connection.client()
    }

    pub fn partition(&self) -> Option<&str> {
        self.keys.partition()
    }

    pub fn ownership(&self) -> Ownership {
        self.connection.ownership()
    }

    pub fn state(&self) -> LifecycleState {
        self.connection.state()
    }

    /// Readiness and key shape, checked before any network call.
    fn prepare(&self, key: &CacheKey) -> Result<()> {
        self.connection.ensure_ready()?;
        KeyGenerator::validate_key(key)
    }
}

impl<S, V> Debug for RemoteCacheAdapter<S, V>
where
    S: RemoteStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCacheAdapter")
            .field("connection", &self.connection)
            .field("partition", &self.keys.partition())
            .finish()
    }
}

#[async_trait]
impl<S, V> CacheStore<V> for RemoteCacheAdapter<S, V>
where
    S: RemoteStore,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn start(&self) -> Result<()> {
        self.connection.start().await
    }

    async fn stop(&self) -> Result<()> {
        self.connection.stop().await
    }

    fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    fn validate_segment_name(&self, name: &str) -> Result<()> {
        keys::validate_segment_name(name)
    }

    async fn get(&self, key: Option<&CacheKey>) -> Result<Option<Envelope<V>>> {
        let Some(key) = key else {
            return Ok(None);
        };
        self.prepare(key)?;

        let storage_key = self.keys.generate_key(key);
        let raw = self.connection.client().get(storage_key.as_str()).await?;
        let found = envelope::decode(raw.as_deref())?;

        tracing::debug!(
            "GET '{}' {}",
            storage_key,
            if found.is_some() { "hit" } else { "miss" }
        );
        Ok(found)
    }

    async fn set(&self, key: &CacheKey, value: V, ttl: TtlMs) -> Result<()> {
        self.prepare(key)?;

        if !ttl.is_positive() {
            tracing::debug!(
                "Skipping SET for segment '{}': non-positive ttl {}ms",
                key.segment,
                ttl.0
            );
            return Ok(());
        }

        let storage_key = self.keys.generate_key(key);
        let payload = envelope::encode(&value, ttl)?;
        let expiry_secs = ttl.expiry_secs();

        self.connection
            .client()
            .set_ex(storage_key.as_str(), payload, expiry_secs)
            .await?;

        tracing::debug!("SET '{}' with expiry {}s", storage_key, expiry_secs);
        Ok(())
    }

    async fn drop(&self, key: &CacheKey) -> Result<()> {
        self.prepare(key)?;

        let storage_key = self.keys.generate_key(key);
        let removed = self.connection.client().del(storage_key.as_str()).await?;

        tracing::debug!("DROP '{}' removed {} key(s)", storage_key, removed);
        Ok(())
    }
}
