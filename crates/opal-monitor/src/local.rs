use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use opal_domain::Store;
use tokio::sync::RwLock;
use tracing::debug;

use crate::downstream::{StoreCleaner, StoreRepository};
use crate::error::MonitorError;

/// In-memory implementation of [`StoreRepository`].
///
/// Suitable for tests and single-node deployments; `refresh` is a no-op
/// since there is no external source of truth to re-read.
#[derive(Clone, Default)]
pub struct InMemoryStoreRepository {
    stores: Arc<RwLock<HashMap<String, Store>>>,
}

impl InMemoryStoreRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_store(&self, store: Store) {
        let mut guard = self.stores.write().await;
        guard.insert(store.name.clone(), store);
    }
}

#[async_trait]
impl StoreRepository for InMemoryStoreRepository {
    async fn get_store(&self, name: &str) -> Option<Store> {
        let guard = self.stores.read().await;
        guard.get(name).cloned()
    }

    async fn refresh(&self) {
        debug!("InMemoryStoreRepository: refresh is a no-op");
    }

    async fn update_store(&self, store: Store) -> Result<(), MonitorError> {
        let mut guard = self.stores.write().await;
        guard.insert(store.name.clone(), store);
        Ok(())
    }
}

/// A stub cleaner that logs what it would delete and performs no I/O.
#[derive(Debug, Default, Clone)]
pub struct NoopStoreCleaner;

impl NoopStoreCleaner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreCleaner for NoopStoreCleaner {
    async fn delete_one_store_version(
        &self,
        store_name: &str,
        version: u64,
    ) -> Result<(), MonitorError> {
        debug!(store = %store_name, version, "NoopStoreCleaner: delete_one_store_version");
        Ok(())
    }

    async fn topic_cleanup_when_push_complete(&self, topic: &str) -> Result<(), MonitorError> {
        debug!(topic = %topic, "NoopStoreCleaner: topic_cleanup_when_push_complete");
        Ok(())
    }

    async fn retire_old_store_versions(&self, store_name: &str) -> Result<(), MonitorError> {
        debug!(store = %store_name, "NoopStoreCleaner: retire_old_store_versions");
        Ok(())
    }
}
