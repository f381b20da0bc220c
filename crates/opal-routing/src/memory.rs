use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use opal_domain::Instance;
use tokio::sync::RwLock;

use crate::assignment::PartitionAssignment;
use crate::error::RoutingError;
use crate::repository::{RoutingDataChangedListener, RoutingDataRepository};

#[derive(Default)]
struct Inner {
    assignments: HashMap<String, PartitionAssignment>,
    ideal_state: HashSet<String>,
    live_instances: HashMap<String, Instance>,
    listeners: HashMap<String, Vec<Arc<dyn RoutingDataChangedListener>>>,
}

/// In-memory implementation of [`RoutingDataRepository`].
///
/// Doubles as the event source in tests: `apply_external_view` and
/// `delete_routing_data` mutate the view and fan the change out to
/// subscribed listeners. Listener snapshots are taken before the inner lock
/// is released, and callbacks run outside it.
#[derive(Clone, Default)]
pub struct InMemoryRoutingRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRoutingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners currently subscribed for `topic`.
    pub async fn listener_count(&self, topic: &str) -> usize {
        let guard = self.inner.read().await;
        guard.listeners.get(topic).map_or(0, |l| l.len())
    }

    pub async fn add_live_instance(&self, instance: Instance) {
        let mut guard = self.inner.write().await;
        guard.live_instances.insert(instance.node_id.clone(), instance);
    }

    pub async fn remove_live_instance(&self, node_id: &str) {
        let mut guard = self.inner.write().await;
        guard.live_instances.remove(node_id);
    }

    pub async fn set_ideal_state(&self, topic: &str, present: bool) {
        let mut guard = self.inner.write().await;
        if present {
            guard.ideal_state.insert(topic.to_string());
        } else {
            guard.ideal_state.remove(topic);
        }
    }

    /// Install a new observed assignment and notify subscribers.
    pub async fn apply_external_view(&self, assignment: PartitionAssignment) {
        let topic = assignment.topic.clone();
        let listeners: Vec<Arc<dyn RoutingDataChangedListener>> = {
            let mut guard = self.inner.write().await;
            guard.assignments.insert(topic.clone(), assignment.clone());
            guard.listeners.get(&topic).cloned().unwrap_or_default()
        };
        for listener in listeners {
            listener.on_external_view_change(assignment.clone()).await;
        }
    }

    /// Drop the routing data for a topic and notify subscribers. The
    /// ideal-state flag is controlled separately via `set_ideal_state`.
    pub async fn delete_routing_data(&self, topic: &str) {
        let listeners: Vec<Arc<dyn RoutingDataChangedListener>> = {
            let mut guard = self.inner.write().await;
            guard.assignments.remove(topic);
            guard.listeners.get(topic).cloned().unwrap_or_default()
        };
        for listener in listeners {
            listener.on_routing_data_deleted(topic).await;
        }
    }
}

#[async_trait]
impl RoutingDataRepository for InMemoryRoutingRepository {
    async fn subscribe_routing_data_change(
        &self,
        topic: &str,
        listener: Arc<dyn RoutingDataChangedListener>,
    ) {
        let mut guard = self.inner.write().await;
        guard
            .listeners
            .entry(topic.to_string())
            .or_default()
            .push(listener);
    }

    async fn unsubscribe_routing_data_change(
        &self,
        topic: &str,
        listener: &Arc<dyn RoutingDataChangedListener>,
    ) {
        let mut guard = self.inner.write().await;
        if let Some(listeners) = guard.listeners.get_mut(topic) {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            if listeners.is_empty() {
                guard.listeners.remove(topic);
            }
        }
    }

    async fn contains_kafka_topic(&self, topic: &str) -> bool {
        let guard = self.inner.read().await;
        guard.assignments.contains_key(topic)
    }

    async fn resources_exist_in_ideal_state(&self, topic: &str) -> bool {
        let guard = self.inner.read().await;
        guard.ideal_state.contains(topic)
    }

    async fn partition_assignments(
        &self,
        topic: &str,
    ) -> Result<PartitionAssignment, RoutingError> {
        let guard = self.inner.read().await;
        guard
            .assignments
            .get(topic)
            .cloned()
            .ok_or_else(|| RoutingError::TopicNotFound(topic.to_string()))
    }

    async fn live_instances(&self) -> HashMap<String, Instance> {
        let guard = self.inner.read().await;
        guard.live_instances.clone()
    }
}
