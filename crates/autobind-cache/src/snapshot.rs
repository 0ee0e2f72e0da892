//! Serialized per-alias snapshot

use std::time::{SystemTime, UNIX_EPOCH};

use autobind_core::{AliasTables, Registry};
use serde::{Deserialize, Serialize};

use crate::key::CacheKey;

/// Everything one alias owns plus the key it was produced under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    /// Key the tables were parsed under
    pub key: CacheKey,
    /// Seconds since the Unix epoch
    pub created_at: u64,
    /// Alias-scoped tables
    pub tables: AliasTables,
}

impl CachedSnapshot {
    /// Copy the tables owned by `key.alias` out of the registry
    pub fn capture(registry: &Registry, key: CacheKey) -> Self {
        let tables = registry.snapshot_alias(&key.alias);
        Self {
            key,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            tables,
        }
    }

    /// Merge into live tables; manual signatures already present are kept
    pub fn restore_into(self, registry: &Registry) {
        let alias = self.key.alias.clone();
        registry.restore_alias(&alias, self.tables);
    }
}
