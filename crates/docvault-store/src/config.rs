//! Store configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for opening a [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,

    /// Number of pooled connections.
    pub pool_size: usize,

    /// How long a connection waits on a locked database (ms).
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 4,
            busy_timeout_ms: 5000,
        }
    }
}

impl StoreConfig {
    /// In-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Pool size actually used.
    ///
    /// Every in-memory connection is its own database, so those pools hold
    /// exactly one connection.
    pub fn effective_pool_size(&self) -> usize {
        match self.path {
            None => 1,
            Some(_) => self.pool_size.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pool_is_single() {
        assert_eq!(StoreConfig::memory().with_pool_size(8).effective_pool_size(), 1);
        assert_eq!(StoreConfig::file("a.db").with_pool_size(0).effective_pool_size(), 1);
        assert_eq!(StoreConfig::file("a.db").effective_pool_size(), 4);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: StoreConfig =
            serde_json::from_str(r#"{ "path": "/tmp/vault.db", "pool_size": 2 }"#).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/vault.db")));
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.busy_timeout_ms, 5000);
    }
}
