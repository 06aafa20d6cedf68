use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from a correlation store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Correlation store unavailable: {0}")]
    Unavailable(String),
}

/// Shared key-value medium between callers and workers.
///
/// Keys are partitioned by group. `get` returns `Ok(None)` while nothing has
/// been written; absence is the normal state before a worker responds.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    async fn set(&self, group: &str, key: &str, value: Value) -> Result<(), StoreError>;

    async fn get(&self, group: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Connectivity check used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Backend name for logging
    fn backend(&self) -> &'static str;
}

/// Process-local store for single-binary deployments and tests
#[derive(Clone, Default)]
pub struct InMemoryCorrelationStore {
    groups: Arc<RwLock<HashMap<String, HashMap<String, Value>>>>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held in a group
    pub async fn len(&self, group: &str) -> usize {
        let groups = self.groups.read().await;
        groups.get(group).map(|g| g.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn set(&self, group: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, group: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups.get(group).and_then(|g| g.get(key)).cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
