use async_trait::async_trait;
use opal_domain::Store;

use crate::error::MonitorError;

/// Read/write access to the store/version catalog.
///
/// The repository has its own internal synchronization. Lock order is
/// monitor lock → repository lock; implementations must not call back into
/// the monitor.
#[async_trait]
pub trait StoreRepository: Send + Sync + 'static {
    async fn get_store(&self, name: &str) -> Option<Store>;

    /// Re-read the catalog from its source of truth. Expensive; only called
    /// after a store miss.
    async fn refresh(&self);

    async fn update_store(&self, store: Store) -> Result<(), MonitorError>;
}

/// Deletes retired versions and finished push topics.
#[async_trait]
pub trait StoreCleaner: Send + Sync + 'static {
    async fn delete_one_store_version(
        &self,
        store_name: &str,
        version: u64,
    ) -> Result<(), MonitorError>;

    async fn topic_cleanup_when_push_complete(&self, topic: &str) -> Result<(), MonitorError>;

    async fn retire_old_store_versions(&self, store_name: &str) -> Result<(), MonitorError>;
}

/// Starts buffer replay from a hybrid store's real-time topic into a
/// version topic.
#[async_trait]
pub trait TopicReplicator: Send + Sync + 'static {
    async fn prepare_and_start_replication(
        &self,
        real_time_topic: &str,
        version_topic: &str,
        store: &Store,
    ) -> Result<(), MonitorError>;
}

/// Mirrors current-version state into a store's metadata system store.
#[async_trait]
pub trait MetaStoreWriter: Send + Sync + 'static {
    async fn write_current_version_state(&self, store: &Store) -> Result<(), MonitorError>;
}
