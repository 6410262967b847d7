use crate::domain::{CacheKey, StorageKey};
use shared::{Error, Result};

const DELIMITER: &str = ":";

/// Maps structured cache keys onto flat storage keys.
///
/// Every component is percent-encoded on its own before joining, so a
/// delimiter inside a segment or id can never produce an ambiguous key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyGenerator {
    partition: Option<String>,
}

impl KeyGenerator {
    pub fn new(partition: Option<String>) -> Self {
        Self { partition }
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    pub fn generate_key(&self, key: &CacheKey) -> StorageKey {
        let components = self
            .partition
            .iter()
            .map(String::as_str)
            .chain([key.segment.as_str(), key.id.as_str()])
            .map(urlencoding::encode)
            .collect::<Vec<_>>();

        StorageKey::new(components.join(DELIMITER))
    }

    /// Rejects keys the generator must never see.
    pub fn validate_key(key: &CacheKey) -> Result<()> {
        if key.segment.is_empty() {
            return Err(Error::InvalidKey("missing segment".to_string()));
        }
        if key.id.is_empty() {
            return Err(Error::InvalidKey("missing id".to_string()));
        }
        Ok(())
    }
}

pub fn validate_segment_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("Empty string".to_string()));
    }
    if name.contains('\0') {
        return Err(Error::Validation("Includes null character".to_string()));
    }
    Ok(())
}
