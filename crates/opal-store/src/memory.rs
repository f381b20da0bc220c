use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::accessor::{OfflinePushAccessor, PartitionStatusListener};
use crate::error::PushStoreError;
use crate::status::{OfflinePushStatus, PartitionStatus};

#[derive(Default)]
struct Inner {
    pushes: HashMap<String, OfflinePushStatus>,
    listeners: HashMap<String, Vec<Arc<dyn PartitionStatusListener>>>,
}

/// In-memory implementation of [`OfflinePushAccessor`].
///
/// All data is lost on process exit. Suitable for tests and single-node
/// deployments without a metadata service.
#[derive(Clone, Default)]
pub struct InMemoryPushAccessor {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPushAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners currently subscribed for `topic`.
    pub async fn listener_count(&self, topic: &str) -> usize {
        let guard = self.inner.read().await;
        guard.listeners.get(topic).map_or(0, |l| l.len())
    }

    /// Apply a replica progress report and fan it out to subscribed
    /// listeners, the way a watcher on the real metadata service would.
    ///
    /// The inner lock is released before any listener runs.
    pub async fn write_partition_status(&self, topic: &str, partition_status: PartitionStatus) {
        let listeners: Vec<Arc<dyn PartitionStatusListener>> = {
            let mut guard = self.inner.write().await;
            match guard.pushes.get_mut(topic) {
                Some(push) => {
                    if let Err(e) = push.set_partition_status(partition_status.clone()) {
                        warn!(topic = %topic, error = %e, "dropping partition status write");
                        return;
                    }
                }
                None => {
                    warn!(topic = %topic, "partition status write for unknown push");
                    return;
                }
            }
            guard.listeners.get(topic).cloned().unwrap_or_default()
        };
        for listener in listeners {
            listener
                .on_partition_status_change(topic, partition_status.clone())
                .await;
        }
    }
}

#[async_trait]
impl OfflinePushAccessor for InMemoryPushAccessor {
    async fn create_offline_push_status_and_its_partition_statuses(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), PushStoreError> {
        let mut guard = self.inner.write().await;
        guard.pushes.insert(push.kafka_topic.clone(), push.clone());
        Ok(())
    }

    async fn update_offline_push_status(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), PushStoreError> {
        let mut guard = self.inner.write().await;
        if !guard.pushes.contains_key(&push.kafka_topic) {
            return Err(PushStoreError::PushNotFound(push.kafka_topic.clone()));
        }
        guard.pushes.insert(push.kafka_topic.clone(), push.clone());
        Ok(())
    }

    async fn delete_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<(), PushStoreError> {
        let mut guard = self.inner.write().await;
        guard.pushes.remove(topic);
        Ok(())
    }

    async fn load_offline_push_statuses_and_partition_statuses(
        &self,
    ) -> Result<Vec<OfflinePushStatus>, PushStoreError> {
        let guard = self.inner.read().await;
        Ok(guard.pushes.values().cloned().collect())
    }

    async fn get_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<OfflinePushStatus, PushStoreError> {
        let guard = self.inner.read().await;
        guard
            .pushes
            .get(topic)
            .cloned()
            .ok_or_else(|| PushStoreError::PushNotFound(topic.to_string()))
    }

    async fn subscribe_partition_status_change(
        &self,
        topic: &str,
        listener: Arc<dyn PartitionStatusListener>,
    ) {
        let mut guard = self.inner.write().await;
        guard
            .listeners
            .entry(topic.to_string())
            .or_default()
            .push(listener);
    }

    async fn unsubscribe_partition_status_change(
        &self,
        topic: &str,
        listener: &Arc<dyn PartitionStatusListener>,
    ) {
        let mut guard = self.inner.write().await;
        if let Some(listeners) = guard.listeners.get_mut(topic) {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            if listeners.is_empty() {
                guard.listeners.remove(topic);
            }
        }
    }
}
