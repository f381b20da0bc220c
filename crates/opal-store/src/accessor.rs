use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PushStoreError;
use crate::status::{OfflinePushStatus, PartitionStatus};

/// Callback for per-partition replica progress published through the durable
/// accessor's watcher.
#[async_trait]
pub trait PartitionStatusListener: Send + Sync + 'static {
    async fn on_partition_status_change(&self, topic: &str, partition_status: PartitionStatus);
}

/// Durable KV storage for push statuses and their per-partition statuses.
///
/// Implementations must make a successful `update_offline_push_status` durable
/// before returning, and must never invoke a listener while holding internal
/// locks, so a listener may unsubscribe itself from within the callback.
#[async_trait]
pub trait OfflinePushAccessor: Send + Sync + 'static {
    async fn create_offline_push_status_and_its_partition_statuses(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), PushStoreError>;

    async fn update_offline_push_status(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), PushStoreError>;

    async fn delete_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<(), PushStoreError>;

    async fn load_offline_push_statuses_and_partition_statuses(
        &self,
    ) -> Result<Vec<OfflinePushStatus>, PushStoreError>;

    async fn get_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<OfflinePushStatus, PushStoreError>;

    async fn subscribe_partition_status_change(
        &self,
        topic: &str,
        listener: Arc<dyn PartitionStatusListener>,
    );

    async fn unsubscribe_partition_status_change(
        &self,
        topic: &str,
        listener: &Arc<dyn PartitionStatusListener>,
    );
}
