use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use opal_domain::Instance;

use crate::assignment::PartitionAssignment;
use crate::error::RoutingError;

/// Callbacks fired by the routing-data repository.
///
/// Implementations of [`RoutingDataRepository`] must invoke these without
/// holding internal locks: a listener handling a terminal transition
/// unsubscribes itself from within the callback.
#[async_trait]
pub trait RoutingDataChangedListener: Send + Sync + 'static {
    /// The observed assignment for a subscribed topic changed.
    async fn on_external_view_change(&self, assignment: PartitionAssignment);

    /// The routing data node for a subscribed topic was deleted.
    async fn on_routing_data_deleted(&self, topic: &str);
}

/// Read access to the cluster manager's routing data, plus per-topic change
/// subscriptions.
#[async_trait]
pub trait RoutingDataRepository: Send + Sync + 'static {
    async fn subscribe_routing_data_change(
        &self,
        topic: &str,
        listener: Arc<dyn RoutingDataChangedListener>,
    );

    async fn unsubscribe_routing_data_change(
        &self,
        topic: &str,
        listener: &Arc<dyn RoutingDataChangedListener>,
    );

    /// Whether the topic is present in the observed view at all.
    async fn contains_kafka_topic(&self, topic: &str) -> bool;

    /// Whether the resource still exists in the cluster manager's desired
    /// (ideal-state) assignment, as opposed to the observed view.
    async fn resources_exist_in_ideal_state(&self, topic: &str) -> bool;

    async fn partition_assignments(
        &self,
        topic: &str,
    ) -> Result<PartitionAssignment, RoutingError>;

    /// Currently live serving nodes, keyed by node id.
    async fn live_instances(&self) -> HashMap<String, Instance>;
}
