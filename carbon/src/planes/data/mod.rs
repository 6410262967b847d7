pub mod cache_operations;

pub use cache_operations::RemoteCacheAdapter;
