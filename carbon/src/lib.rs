//! Cache adapter over a remote key-value store.
//!
//! The control plane manages the connection lifecycle, the data plane
//! implements get/set/drop on JSON envelopes under partitioned storage keys.

pub mod domain;
pub mod envelope;
pub mod keys;
pub mod planes;
pub mod ports;

pub use domain::{CacheKey, ConnectionStatus, Envelope, LifecycleState, Ownership, StorageKey};
pub use keys::{KeyGenerator, validate_segment_name};
pub use planes::control::Connection;
pub use planes::data::RemoteCacheAdapter;
pub use ports::{CacheStore, RemoteStore};
