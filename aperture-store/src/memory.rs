//! In-memory flag store.

use crate::error::StoreResult;
use crate::traits::FlagStore;
use aperture_core::FeatureFlag;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryFlagStore {
    flags: Arc<RwLock<HashMap<String, FeatureFlag>>>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored flags.
    pub async fn len(&self) -> usize {
        self.flags.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flags.read().await.is_empty()
    }
}

#[async_trait]
impl FlagStore for InMemoryFlagStore {
    async fn get(&self, name: &str) -> StoreResult<Option<FeatureFlag>> {
        Ok(self.flags.read().await.get(name).cloned())
    }

    async fn put(&self, flag: FeatureFlag) -> StoreResult<()> {
        self.flags.write().await.insert(flag.name.clone(), flag);
        Ok(())
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        Ok(self.flags.write().await.remove(name).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .flags
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
