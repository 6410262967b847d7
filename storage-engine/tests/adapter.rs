use carbon::{CacheKey, CacheStore, LifecycleState, Ownership, RemoteCacheAdapter, RemoteStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::config::AdapterConfig;
use shared::{Error, TtlMs};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::MemoryStore;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn ready_adapter<V>(partition: Option<&str>) -> (Arc<MemoryStore>, RemoteCacheAdapter<MemoryStore, V>)
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let adapter = RemoteCacheAdapter::new(store.clone(), partition.map(str::to_string));
    adapter.start().await.unwrap();
    (store, adapter)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
    roles: Vec<String>,
}

#[tokio::test]
async fn round_trips_falsy_and_structured_values() {
    let (_, adapter) = ready_adapter::<serde_json::Value>(Some("foo")).await;

    let values = [
        json!(0),
        json!(false),
        json!(""),
        json!("hello"),
        json!(42.5),
        json!({"nested": {"list": [1, 2, 3]}}),
    ];

    for (i, value) in values.into_iter().enumerate() {
        let key = CacheKey::new("values", i.to_string());
        adapter.set(&key, value.clone(), TtlMs(10_000)).await.unwrap();

        let envelope = adapter.get(Some(&key)).await.unwrap().unwrap();
        assert_eq!(envelope.item, value);
        assert_eq!(envelope.ttl, 10_000);
        assert!(envelope.stored > 0);
    }
}

#[tokio::test]
async fn round_trips_typed_values() {
    let (_, adapter) = ready_adapter::<Session>(None).await;
    let key = CacheKey::new("sessions", "alice");
    let session = Session {
        user: "alice".to_string(),
        roles: vec!["admin".to_string()],
    };

    adapter.set(&key, session.clone(), TtlMs(60_000)).await.unwrap();
    let envelope = adapter.get(Some(&key)).await.unwrap().unwrap();
    assert_eq!(envelope.item, session);
}

#[tokio::test]
async fn writes_envelopes_under_partitioned_keys() {
    let (store, adapter) = ready_adapter::<String>(Some("foo")).await;

    adapter
        .set(&CacheKey::new("baz", "bar"), "x".to_string(), TtlMs(2500))
        .await
        .unwrap();

    let raw = store.raw("foo:baz:bar").await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["item"], json!("x"));
    assert_eq!(parsed["ttl"], json!(2500));
    assert!(parsed["stored"].as_u64().unwrap() > 0);
    assert_eq!(store.expiry_of("foo:baz:bar").await, Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn sub_second_ttl_gets_one_second_expiry() {
    let (store, adapter) = ready_adapter::<String>(None).await;

    adapter
        .set(&CacheKey::new("s", "id"), "v".to_string(), TtlMs(1))
        .await
        .unwrap();
    assert_eq!(store.expiry_of("s:id").await, Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn non_positive_ttl_does_not_write() {
    let (store, adapter) = ready_adapter::<String>(None).await;

    adapter
        .set(&CacheKey::new("s", "id"), "v".to_string(), TtlMs(0))
        .await
        .unwrap();
    assert_eq!(store.stats().writes, 0);
    assert!(store.raw("s:id").await.is_none());
}

#[tokio::test]
async fn operations_fail_before_start() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let adapter: RemoteCacheAdapter<MemoryStore, String> = RemoteCacheAdapter::new(store.clone(), None);
    let key = CacheKey::new("s", "id");

    assert!(!adapter.is_ready());
    assert!(adapter.get(Some(&key)).await.unwrap_err().is_not_connected());
    assert!(adapter
        .set(&key, "v".to_string(), TtlMs(1000))
        .await
        .unwrap_err()
        .is_not_connected());
    assert!(adapter.drop(&key).await.unwrap_err().is_not_connected());

    let stats = store.stats();
    assert_eq!(stats.reads + stats.writes + stats.deletes, 0);
}

#[tokio::test]
async fn concurrent_starts_share_one_connect() {
    init_tracing();
    let store = Arc::new(MemoryStore::new().with_connect_delay(Duration::from_millis(25)));
    let adapter: Arc<RemoteCacheAdapter<MemoryStore, String>> =
        Arc::new(RemoteCacheAdapter::new(store.clone(), None));

    let (a, b) = tokio::join!(adapter.start(), adapter.start());
    a.unwrap();
    b.unwrap();
    adapter.start().await.unwrap();

    assert!(adapter.is_ready());
    assert_eq!(store.stats().connects, 1);
}

#[tokio::test]
async fn concurrent_starts_share_one_failure() {
    init_tracing();
    let store = Arc::new(
        MemoryStore::new()
            .with_connect_delay(Duration::from_millis(25))
            .refusing_connections(),
    );
    let adapter: RemoteCacheAdapter<MemoryStore, String> = RemoteCacheAdapter::new(store.clone(), None);

    let results = futures::future::join_all((0..4).map(|_| adapter.start())).await;
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.to_string(), "connect ECONNREFUSED");
    }
    assert_eq!(store.stats().connects, 1);
    assert!(!adapter.is_ready());
}

#[tokio::test]
async fn missing_key_returns_none() {
    let (_, adapter) = ready_adapter::<String>(Some("foo")).await;
    assert!(adapter.get(Some(&CacheKey::new("never", "set"))).await.unwrap().is_none());
}

#[tokio::test]
async fn get_without_key_returns_none() {
    let (store, adapter) = ready_adapter::<String>(None).await;
    assert!(adapter.get(None).await.unwrap().is_none());
    assert_eq!(store.stats().reads, 0);
}

#[tokio::test]
async fn malformed_content_is_reported() {
    let (store, adapter) = ready_adapter::<String>(None).await;
    let key = CacheKey::new("test", "test");
    let ttl = Duration::from_secs(60);

    store.insert_raw("test:test", "test", ttl).await;
    let err = adapter.get(Some(&key)).await.unwrap_err();
    assert!(matches!(err, Error::BadEnvelope));
    assert_eq!(err.to_string(), "Bad envelope content");

    store.insert_raw("test:test", r#"{"item":"false"}"#, ttl).await;
    let err = adapter.get(Some(&key)).await.unwrap_err();
    assert!(matches!(err, Error::EnvelopeStructure));

    store.insert_raw("test:test", r#"{"stored":"123"}"#, ttl).await;
    let err = adapter.get(Some(&key)).await.unwrap_err();
    assert_eq!(err.to_string(), "Incorrect envelope structure");
}

#[tokio::test]
async fn malformed_stored_timestamp_is_structural() {
    let (store, adapter) = ready_adapter::<String>(None).await;
    let key = CacheKey::new("s", "id");
    let ttl = Duration::from_secs(60);

    store.insert_raw("s:id", r#"{"item":"x","stored":"123"}"#, ttl).await;
    let err = adapter.get(Some(&key)).await.unwrap_err();
    assert!(matches!(err, Error::EnvelopeStructure));

    store.insert_raw("s:id", r#"{"item":"x","stored":1.7e12}"#, ttl).await;
    let envelope = adapter.get(Some(&key)).await.unwrap().unwrap();
    assert_eq!(envelope.item, "x");
    assert_eq!(envelope.stored, 1_700_000_000_000);
}

#[tokio::test]
async fn refused_connect_reports_closed_state() {
    init_tracing();
    let store = Arc::new(MemoryStore::new().refusing_connections());
    let adapter: RemoteCacheAdapter<MemoryStore, String> = RemoteCacheAdapter::new(store.clone(), None);

    assert!(matches!(adapter.start().await, Err(Error::Transport(_))));
    assert_eq!(adapter.state(), LifecycleState::Closed);
    assert!(!adapter.is_ready());
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<Box<Node>>,
    cyclic: bool,
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{Error as _, SerializeStruct};

        if self.cyclic {
            return Err(S::Error::custom("Converting circular structure to JSON"));
        }
        let mut node = serializer.serialize_struct("Node", 2)?;
        node.serialize_field("name", &self.name)?;
        node.serialize_field("parent", &self.parent)?;
        node.end()
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Plain {
            name: String,
            parent: Option<Box<Node>>,
        }
        let plain = Plain::deserialize(deserializer)?;
        Ok(Node {
            name: plain.name,
            parent: plain.parent,
            cyclic: false,
        })
    }
}

#[tokio::test]
async fn serialization_failure_is_propagated_without_write() {
    let (store, adapter) = ready_adapter::<Node>(None).await;
    let node = Node {
        name: "child".to_string(),
        parent: Some(Box::new(Node {
            name: "root".to_string(),
            parent: None,
            cyclic: true,
        })),
        cyclic: false,
    };

    let err = adapter
        .set(&CacheKey::new("graph", "child"), node, TtlMs(1000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
    assert_eq!(err.to_string(), "Converting circular structure to JSON");
    assert_eq!(store.stats().writes, 0);
}

#[tokio::test]
async fn drop_removes_and_is_idempotent() {
    let (store, adapter) = ready_adapter::<String>(Some("foo")).await;
    let key = CacheKey::new("baz", "bar");

    adapter.set(&key, "v".to_string(), TtlMs(5000)).await.unwrap();
    adapter.drop(&key).await.unwrap();
    adapter.drop(&key).await.unwrap();

    assert!(adapter.get(Some(&key)).await.unwrap().is_none());
    assert_eq!(store.stats().deletes, 2);
}

#[tokio::test]
async fn partitions_isolate_shared_store() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let tenant_a: RemoteCacheAdapter<MemoryStore, String> =
        RemoteCacheAdapter::new(store.clone(), Some("a".to_string()));
    let tenant_b: RemoteCacheAdapter<MemoryStore, String> =
        RemoteCacheAdapter::new(store.clone(), Some("b".to_string()));
    tenant_a.start().await.unwrap();
    tenant_b.start().await.unwrap();
    assert_eq!(store.stats().connects, 1);

    let key = CacheKey::new("segment", "id");
    tenant_a.set(&key, "from a".to_string(), TtlMs(5000)).await.unwrap();

    assert!(tenant_b.get(Some(&key)).await.unwrap().is_none());
    assert_eq!(tenant_a.get(Some(&key)).await.unwrap().unwrap().item, "from a");
}

#[tokio::test]
async fn stop_leaves_injected_connection_open() {
    let (store, adapter) = ready_adapter::<String>(None).await;
    assert_eq!(adapter.ownership(), Ownership::Borrowed);

    adapter.stop().await.unwrap();
    assert!(adapter.is_ready());
    assert!(store.get("anything").await.is_ok());
}

#[tokio::test]
async fn stop_closes_owned_connection() {
    init_tracing();
    let adapter: RemoteCacheAdapter<MemoryStore, String> =
        RemoteCacheAdapter::from_config(&AdapterConfig::with_partition("owned"));
    assert_eq!(adapter.ownership(), Ownership::Owned);
    assert_eq!(adapter.partition(), Some("owned"));
    assert_eq!(adapter.state(), LifecycleState::Uninitialized);

    adapter.start().await.unwrap();
    assert_eq!(adapter.state(), LifecycleState::Ready);

    adapter.stop().await.unwrap();
    assert_eq!(adapter.state(), LifecycleState::Closed);

    let err = adapter.get(Some(&CacheKey::new("s", "id"))).await.unwrap_err();
    assert!(err.is_not_connected());

    // A closed handle is not reconnected by start().
    adapter.start().await.unwrap();
    assert!(!adapter.is_ready());
    assert_eq!(adapter.client().stats().connects, 1);
}

#[tokio::test]
async fn validates_segment_names() {
    let (_, adapter) = ready_adapter::<String>(None).await;

    assert_eq!(adapter.validate_segment_name("").unwrap_err().to_string(), "Empty string");
    assert_eq!(
        adapter.validate_segment_name("a\0b").unwrap_err().to_string(),
        "Includes null character"
    );
    assert!(adapter.validate_segment_name("valid").is_ok());
}

#[tokio::test]
async fn entries_expire_in_the_store() {
    let (store, adapter) = ready_adapter::<String>(None).await;
    let key = CacheKey::new("short", "lived");

    adapter.set(&key, "v".to_string(), TtlMs(1000)).await.unwrap();
    assert!(adapter.get(Some(&key)).await.unwrap().is_some());

    store
        .insert_raw("short:lived", store.raw("short:lived").await.unwrap(), Duration::from_millis(50))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(adapter.get(Some(&key)).await.unwrap().is_none());
}
