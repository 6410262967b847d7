use tracing::{debug, warn};

/// Adapter settings resolved from the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Namespace prefix isolating this cache from others sharing the store.
    pub partition: Option<String>,
}

impl AdapterConfig {
    const PARTITION_VAR: &'static str = "CARBON_PARTITION";

    /// Load from `.env` (if present) and the process environment.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment variables from {}", path.display()),
            Err(_) => debug!("No .env file found, using system environment variables"),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let partition = match lookup(Self::PARTITION_VAR) {
            Some(value) if value.trim().is_empty() => {
                warn!("{} is set but empty, ignoring it", Self::PARTITION_VAR);
                None
            }
            Some(value) => Some(value.trim().to_string()),
            None => None,
        };

        Self { partition }
    }

    pub fn with_partition(partition: impl Into<String>) -> Self {
        Self {
            partition: Some(partition.into()),
        }
    }
}
