use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use opal_config::MonitorConfig;
use opal_decider::DeciderRegistry;
use opal_domain::{
    is_system_store, parse_store_from_topic, parse_version_topic, real_time_topic,
    ExecutionStatus, OfflinePushStrategy, VersionStatus,
};
use opal_routing::{PartitionAssignment, RoutingDataChangedListener, RoutingDataRepository};
use opal_store::{
    OfflinePushAccessor, OfflinePushStatus, PartitionStatus, PartitionStatusListener,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::downstream::{MetaStoreWriter, StoreCleaner, StoreRepository, TopicReplicator};
use crate::error::MonitorError;
use crate::retention::select_error_pushes_to_retire;
use crate::stats::PushHealthStats;

type PushMap = HashMap<String, OfflinePushStatus>;

/// Cluster-scoped tracker of offline push lifecycles.
///
/// Owns the topic → push map behind a single read/write lock. tokio's
/// `RwLock` admits waiters FIFO, so bursts of status reads cannot starve the
/// event writers. Published snapshots are immutable: every mutation clones
/// the snapshot, persists the clone, then swaps it into the map, which keeps
/// durable state at least as advanced as in-memory state.
///
/// The monitor is also the listener for both external feeds: replica
/// progress from the durable accessor and assignment changes from the
/// routing repository.
pub struct OfflinePushMonitor {
    me: Weak<OfflinePushMonitor>,
    pushes: RwLock<PushMap>,
    accessor: Arc<dyn OfflinePushAccessor>,
    routing: Arc<dyn RoutingDataRepository>,
    deciders: DeciderRegistry,
    stores: Arc<dyn StoreRepository>,
    cleaner: Arc<dyn StoreCleaner>,
    stats: Arc<dyn PushHealthStats>,
    replicator: Option<Arc<dyn TopicReplicator>>,
    meta_writer: Option<Arc<dyn MetaStoreWriter>>,
    config: MonitorConfig,
}

impl OfflinePushMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accessor: Arc<dyn OfflinePushAccessor>,
        routing: Arc<dyn RoutingDataRepository>,
        deciders: DeciderRegistry,
        stores: Arc<dyn StoreRepository>,
        cleaner: Arc<dyn StoreCleaner>,
        stats: Arc<dyn PushHealthStats>,
        replicator: Option<Arc<dyn TopicReplicator>>,
        meta_writer: Option<Arc<dyn MetaStoreWriter>>,
        config: MonitorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| OfflinePushMonitor {
            me: me.clone(),
            pushes: RwLock::new(HashMap::new()),
            accessor,
            routing,
            deciders,
            stores,
            cleaner,
            stats,
            replicator,
            meta_writer,
            config,
        })
    }

    fn routing_listener(self: &Arc<Self>) -> Arc<dyn RoutingDataChangedListener> {
        Arc::clone(self) as Arc<dyn RoutingDataChangedListener>
    }

    fn partition_listener(self: &Arc<Self>) -> Arc<dyn PartitionStatusListener> {
        Arc::clone(self) as Arc<dyn PartitionStatusListener>
    }

    // ── Startup ──────────────────────────────────────────────────────────────

    /// Rebuild the in-memory map from the pushes loaded out of durable
    /// storage on controller startup.
    ///
    /// Routing is subscribed before each push's status is re-read, so no
    /// assignment change can slip between the read and the subscription.
    /// Pushes whose topic is gone from routing are kept: deleting them here
    /// has historically destroyed data during controller failovers.
    pub async fn load_all_pushes(
        self: &Arc<Self>,
        initial: Vec<OfflinePushStatus>,
    ) -> Result<(), MonitorError> {
        let mut pushes = self.pushes.write().await;
        info!(count = initial.len(), "loading offline pushes from durable storage");

        for push in initial {
            let topic = push.kafka_topic.clone();
            pushes.insert(topic.clone(), push);
            self.routing
                .subscribe_routing_data_change(&topic, self.routing_listener())
                .await;
            match self
                .accessor
                .get_offline_push_status_and_its_partition_statuses(&topic)
                .await
            {
                Ok(fresh) => {
                    pushes.insert(topic.clone(), fresh);
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "failed to re-read push status during load");
                }
            }
            self.accessor
                .subscribe_partition_status_change(&topic, self.partition_listener())
                .await;
        }

        // Pushes may have reached a terminal state while no controller was
        // watching; decide them now from the current assignment.
        let topics: Vec<String> = pushes.keys().cloned().collect();
        for topic in topics {
            let Some(push) = pushes.get(&topic).cloned() else {
                continue;
            };
            if push.is_terminal() {
                continue;
            }
            if !self.routing.contains_kafka_topic(&topic).await {
                info!(topic = %topic, "legacy push without routing data; keeping it");
                continue;
            }
            match self.routing.partition_assignments(&topic).await {
                Ok(assignment) => {
                    let decider = self.deciders.for_strategy(push.strategy)?;
                    let (status, details) =
                        decider.check_push_status_and_details(&push, &assignment);
                    if status.is_terminal() {
                        self.handle_offline_push_update(&mut pushes, push, status, details)
                            .await;
                    }
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "no partition assignment while loading push");
                }
            }
        }

        let store_names: HashSet<String> = pushes
            .keys()
            .filter_map(|topic| parse_store_from_topic(topic).ok())
            .collect();
        for store_name in store_names {
            self.retire_old_error_pushes_locked(&mut pushes, &store_name)
                .await;
        }
        Ok(())
    }

    // ── Admin API ────────────────────────────────────────────────────────────

    /// Begin monitoring a fresh push for `topic`.
    ///
    /// A leftover errored push for the same topic is cleaned up first; any
    /// other predecessor fails the call. Both change subscriptions are
    /// acquired before the write lock is released.
    pub async fn start_monitor_offline_push(
        self: &Arc<Self>,
        topic: &str,
        partition_count: u32,
        replication_factor: u32,
        strategy: OfflinePushStrategy,
    ) -> Result<(), MonitorError> {
        let mut pushes = self.pushes.write().await;
        if let Some(existing) = pushes.get(topic).cloned() {
            if existing.current_status == ExecutionStatus::Error {
                info!(topic = %topic, "cleaning up errored predecessor before new push");
                self.cleanup_push_status(&mut pushes, &existing).await;
            } else {
                return Err(MonitorError::PushAlreadyExists(topic.to_string()));
            }
        }

        let push = OfflinePushStatus::new(topic, partition_count, replication_factor, strategy);
        self.accessor
            .create_offline_push_status_and_its_partition_statuses(&push)
            .await?;
        pushes.insert(topic.to_string(), push);
        self.accessor
            .subscribe_partition_status_change(topic, self.partition_listener())
            .await;
        self.routing
            .subscribe_routing_data_change(topic, self.routing_listener())
            .await;
        info!(
            topic = %topic,
            partitions = partition_count,
            replication_factor,
            strategy = %strategy,
            "started monitoring offline push"
        );
        Ok(())
    }

    /// Stop monitoring `topic`. Unknown topics are a warning, not an error.
    ///
    /// An errored push is routed through retention and may stay in the map;
    /// everything else is removed, and durably deleted when
    /// `delete_push_status` is set.
    pub async fn stop_monitor_offline_push(
        self: &Arc<Self>,
        topic: &str,
        delete_push_status: bool,
    ) -> Result<(), MonitorError> {
        let mut pushes = self.pushes.write().await;
        self.routing
            .unsubscribe_routing_data_change(topic, &self.routing_listener())
            .await;
        self.accessor
            .unsubscribe_partition_status_change(topic, &self.partition_listener())
            .await;

        let Some(push) = pushes.get(topic).cloned() else {
            warn!(topic = %topic, "not monitoring topic; nothing to stop");
            return Ok(());
        };
        if push.current_status == ExecutionStatus::Error {
            let store_name = parse_store_from_topic(topic)?;
            self.retire_old_error_pushes_locked(&mut pushes, &store_name)
                .await;
        } else {
            pushes.remove(topic);
            if delete_push_status {
                self.accessor
                    .delete_offline_push_status_and_its_partition_statuses(topic)
                    .await?;
            }
        }
        info!(topic = %topic, "stopped monitoring offline push");
        Ok(())
    }

    /// Best-effort stop of every monitored push, keeping durable statuses.
    pub async fn stop_all_monitoring(self: &Arc<Self>) {
        info!("stopping monitoring for all offline pushes");
        let topics: Vec<String> = {
            let pushes = self.pushes.read().await;
            pushes.keys().cloned().collect()
        };
        for topic in topics {
            if let Err(e) = self.stop_monitor_offline_push(&topic, false).await {
                warn!(topic = %topic, error = %e, "failed to stop monitoring; continuing");
            }
        }
    }

    /// Remove and durably delete every push belonging to `store_name`.
    pub async fn cleanup_store_status(self: &Arc<Self>, store_name: &str) {
        let mut pushes = self.pushes.write().await;
        let topics: Vec<String> = pushes
            .keys()
            .filter(|topic| {
                parse_store_from_topic(topic).map_or(false, |store| store == store_name)
            })
            .cloned()
            .collect();
        info!(store = %store_name, pushes = topics.len(), "cleaning up store push statuses");
        for topic in topics {
            if let Some(push) = pushes.get(&topic).cloned() {
                self.routing
                    .unsubscribe_routing_data_change(&topic, &self.routing_listener())
                    .await;
                self.cleanup_push_status(&mut pushes, &push).await;
            }
        }
    }

    pub async fn get_offline_push(&self, topic: &str) -> Result<OfflinePushStatus, MonitorError> {
        let pushes = self.pushes.read().await;
        pushes
            .get(topic)
            .cloned()
            .ok_or_else(|| MonitorError::PushNotFound(topic.to_string()))
    }

    /// Current status and details for `topic`; an absent push reads as
    /// NotCreated. With an incremental push version, the per-push
    /// incremental check is consulted instead of the overall status.
    pub async fn get_push_status_and_details(
        &self,
        topic: &str,
        incremental_push_version: Option<&str>,
    ) -> (ExecutionStatus, Option<String>) {
        let pushes = self.pushes.read().await;
        match pushes.get(topic) {
            Some(push) => match incremental_push_version {
                Some(version) => (push.incremental_push_status(version), None),
                None => (push.current_status, push.status_details.clone()),
            },
            None => (
                ExecutionStatus::NotCreated,
                Some("offline push has not been created yet".to_string()),
            ),
        }
    }

    pub async fn get_topics_of_ongoing_offline_pushes(&self) -> Vec<String> {
        let pushes = self.pushes.read().await;
        pushes
            .values()
            .filter(|push| push.current_status == ExecutionStatus::Started)
            .map(|push| push.kafka_topic.clone())
            .collect()
    }

    /// Messages consumed per live replica, keyed by `<node_id>_<partition>`.
    ///
    /// Copies the snapshot under a brief read lock and filters against the
    /// live-instance set afterwards; a slightly stale result is acceptable.
    pub async fn get_offline_push_progress(
        &self,
        topic: &str,
    ) -> Result<HashMap<String, u64>, MonitorError> {
        let partition_statuses: Vec<PartitionStatus> = {
            let pushes = self.pushes.read().await;
            let push = pushes
                .get(topic)
                .ok_or_else(|| MonitorError::PushNotFound(topic.to_string()))?;
            push.partition_statuses.values().cloned().collect()
        };

        let live = self.routing.live_instances().await;
        let mut progress = HashMap::new();
        for partition in partition_statuses {
            for replica in partition.replica_statuses.values() {
                if !live.contains_key(&replica.node_id) {
                    continue;
                }
                progress.insert(
                    format!("{}_{}", replica.node_id, partition.partition_id),
                    replica.messages_consumed,
                );
            }
        }
        Ok(progress)
    }

    /// Force `topic` into Error with the given details. Unknown topics are a
    /// warning; an already-terminal push is left untouched.
    pub async fn mark_offline_push_as_error(self: &Arc<Self>, topic: &str, details: String) {
        let mut pushes = self.pushes.write().await;
        match pushes.get(topic).cloned() {
            Some(push) => {
                self.handle_offline_push_update(
                    &mut pushes,
                    push,
                    ExecutionStatus::Error,
                    Some(details),
                )
                .await;
            }
            None => warn!(topic = %topic, "cannot mark unknown push as error"),
        }
    }

    /// Dry-run: would the decider fail this push under the given what-if
    /// assignment? Mutates nothing.
    pub async fn would_job_fail(
        &self,
        topic: &str,
        hypothetical: &PartitionAssignment,
    ) -> Result<bool, MonitorError> {
        let pushes = self.pushes.read().await;
        let push = pushes
            .get(topic)
            .ok_or_else(|| MonitorError::PushNotFound(topic.to_string()))?;
        let decider = self.deciders.for_strategy(push.strategy)?;
        let (status, _) = decider.check_push_status_and_details(push, hypothetical);
        Ok(status == ExecutionStatus::Error)
    }

    /// Retire this store's oldest errored pushes beyond the retention cap.
    pub async fn retire_old_error_pushes(self: &Arc<Self>, store_name: &str) {
        let mut pushes = self.pushes.write().await;
        self.retire_old_error_pushes_locked(&mut pushes, store_name)
            .await;
    }

    /// Validating wrapper for direct status updates: re-reads the live
    /// snapshot so the transition check applies to current state.
    pub async fn refresh_and_update_push_status(
        &self,
        topic: &str,
        new_status: ExecutionStatus,
        details: Option<String>,
    ) -> Result<(), MonitorError> {
        let mut pushes = self.pushes.write().await;
        let push = pushes
            .get(topic)
            .cloned()
            .ok_or_else(|| MonitorError::PushNotFound(topic.to_string()))?;
        self.update_push_status(&mut pushes, push, new_status, details)
            .await;
        Ok(())
    }

    // ── Event handlers ───────────────────────────────────────────────────────

    async fn handle_partition_status_change(
        self: &Arc<Self>,
        topic: &str,
        partition_status: PartitionStatus,
    ) {
        let mut pushes = self.pushes.write().await;
        let Some(push) = pushes.get(topic) else {
            warn!(topic = %topic, "dropping partition status for unknown push");
            return;
        };
        let mut updated = push.clone();
        if let Err(e) = updated.set_partition_status(partition_status) {
            warn!(topic = %topic, error = %e, "dropping out-of-range partition status");
            return;
        }
        pushes.insert(topic.to_string(), updated.clone());

        if let Err(e) = self.check_hybrid_buffer_replay(&mut pushes, updated).await {
            // The listener boundary never propagates; a store missing even
            // after a refresh is an operator problem surfaced in the log.
            error!(topic = %topic, error = %e, "buffer replay check failed");
        }
    }

    async fn handle_external_view_change(self: &Arc<Self>, assignment: PartitionAssignment) {
        let topic = assignment.topic.clone();
        let mut pushes = self.pushes.write().await;
        let Some(push) = pushes.get(&topic).cloned() else {
            debug!(topic = %topic, "ignoring external view change for unmonitored topic");
            return;
        };
        if push.is_terminal() {
            debug!(topic = %topic, "ignoring external view change for terminal push");
            return;
        }
        let decider = match self.deciders.for_strategy(push.strategy) {
            Ok(decider) => decider,
            Err(e) => {
                error!(topic = %topic, error = %e, "no decider for push strategy");
                return;
            }
        };
        let (status, details) = decider.check_push_status_and_details(&push, &assignment);
        // Only terminal decisions are acted on from the routing feed.
        if status.is_terminal() && status != push.current_status {
            self.handle_offline_push_update(&mut pushes, push, status, details)
                .await;
        }
    }

    async fn handle_routing_data_deleted(self: &Arc<Self>, topic: &str) {
        if self.routing.resources_exist_in_ideal_state(topic).await {
            // Still desired; the cluster manager will rebuild the observed view.
            debug!(topic = %topic, "routing data deleted but resource still in ideal state");
            return;
        }
        let current = {
            let pushes = self.pushes.read().await;
            pushes.get(topic).map(|push| push.current_status)
        };
        if current != Some(ExecutionStatus::Started) {
            return;
        }
        warn!(topic = %topic, "routing resource deleted while push in flight");
        let mut pushes = self.pushes.write().await;
        if let Some(push) = pushes.get(topic).cloned() {
            if push.current_status == ExecutionStatus::Started {
                let details =
                    format!("routing resource {} is deleted from the cluster manager", topic);
                self.handle_offline_push_update(
                    &mut pushes,
                    push,
                    ExecutionStatus::Error,
                    Some(details),
                )
                .await;
            }
        }
    }

    // ── Hybrid buffer replay ─────────────────────────────────────────────────

    async fn check_hybrid_buffer_replay(
        self: &Arc<Self>,
        pushes: &mut PushMap,
        push: OfflinePushStatus,
    ) -> Result<(), MonitorError> {
        let store_name = parse_store_from_topic(&push.kafka_topic)?;
        let store = match self.stores.get_store(&store_name).await {
            Some(store) => store,
            None => {
                // One refresh covers a store created after our last catalog
                // read; a second miss is fatal.
                self.stores.refresh().await;
                self.stores
                    .get_store(&store_name)
                    .await
                    .ok_or(MonitorError::StoreNotFound(store_name.clone()))?
            }
        };
        if !store.is_hybrid() || !push.is_ready_to_start_buffer_replay() {
            return Ok(());
        }

        if self.config.skip_buffer_replay_for_hybrid {
            info!(topic = %push.kafka_topic, "skipping buffer replay for hybrid push");
            self.update_push_status(
                pushes,
                push,
                ExecutionStatus::EndOfPushReceived,
                Some("skipped buffer replay".to_string()),
            )
            .await;
            return Ok(());
        }

        let Some(replicator) = &self.replicator else {
            self.handle_offline_push_update(
                pushes,
                push,
                ExecutionStatus::Error,
                Some("The topic replicator was not properly initialized!".to_string()),
            )
            .await;
            return Ok(());
        };

        let rt_topic = real_time_topic(&store_name);
        match replicator
            .prepare_and_start_replication(&rt_topic, &push.kafka_topic, &store)
            .await
        {
            Ok(()) => {
                info!(
                    topic = %push.kafka_topic,
                    real_time_topic = %rt_topic,
                    "kicked off buffer replay for hybrid push"
                );
                self.update_push_status(
                    pushes,
                    push,
                    ExecutionStatus::EndOfPushReceived,
                    Some("kicked off buffer replay".to_string()),
                )
                .await;
            }
            Err(e) => {
                warn!(topic = %push.kafka_topic, error = %e, "buffer replay kickoff failed");
                self.handle_offline_push_update(
                    pushes,
                    push,
                    ExecutionStatus::Error,
                    Some("Failed to kick off the buffer replay".to_string()),
                )
                .await;
            }
        }
        Ok(())
    }

    // ── Terminal handling ────────────────────────────────────────────────────

    /// Drive a push into a terminal status and run its side effects.
    ///
    /// Routing is unsubscribed first, so no late assignment event can reopen
    /// the terminal state.
    async fn handle_offline_push_update(
        self: &Arc<Self>,
        pushes: &mut PushMap,
        push: OfflinePushStatus,
        new_status: ExecutionStatus,
        details: Option<String>,
    ) {
        self.routing
            .unsubscribe_routing_data_change(&push.kafka_topic, &self.routing_listener())
            .await;
        match new_status {
            ExecutionStatus::Completed => self.handle_completed_push(pushes, push).await,
            ExecutionStatus::Error => self.handle_error_push(pushes, push, details).await,
            other => {
                warn!(
                    topic = %push.kafka_topic,
                    status = %other,
                    "handle_offline_push_update called with non-terminal status"
                );
            }
        }
    }

    async fn handle_completed_push(self: &Arc<Self>, pushes: &mut PushMap, push: OfflinePushStatus) {
        let topic = push.kafka_topic.clone();
        let start_time_sec = push.start_time_sec;
        if !self
            .update_push_status(pushes, push, ExecutionStatus::Completed, None)
            .await
        {
            return;
        }

        let (store_name, version) = match parse_version_topic(&topic) {
            Ok(parts) => parts,
            Err(e) => {
                error!(topic = %topic, error = %e, "completed push has unparsable topic");
                return;
            }
        };
        if let Err(e) = self.bring_version_online(&store_name, version).await {
            error!(
                topic = %topic,
                error = %e,
                "failed to update store version status after completed push"
            );
        }
        self.stats
            .record_successful_push(&store_name, push_duration_sec(start_time_sec));

        // Best-effort: a failure here must not abort the completion; the
        // leftovers are re-collected by later retirement passes.
        if let Err(e) = self.cleaner.topic_cleanup_when_push_complete(&topic).await {
            warn!(topic = %topic, error = %e, "topic cleanup after completed push failed");
        }
        if let Err(e) = self.cleaner.retire_old_store_versions(&store_name).await {
            warn!(store = %store_name, error = %e, "old version retirement failed");
        }
        info!(topic = %topic, "offline push completed");
    }

    async fn handle_error_push(
        self: &Arc<Self>,
        pushes: &mut PushMap,
        push: OfflinePushStatus,
        details: Option<String>,
    ) {
        let topic = push.kafka_topic.clone();
        let start_time_sec = push.start_time_sec;
        if details.is_none() {
            // Terminal errors should always explain themselves; surface the
            // gap loudly but keep going.
            error!(topic = %topic, "error push transition arrived without status details");
        }
        if !self
            .update_push_status(pushes, push, ExecutionStatus::Error, details)
            .await
        {
            return;
        }

        let (store_name, version) = match parse_version_topic(&topic) {
            Ok(parts) => parts,
            Err(e) => {
                error!(topic = %topic, error = %e, "errored push has unparsable topic");
                return;
            }
        };
        if let Err(e) = self
            .update_store_version_status(&store_name, version, VersionStatus::Error)
            .await
        {
            error!(topic = %topic, error = %e, "failed to mark store version as errored");
        }
        self.stats
            .record_failed_push(&store_name, push_duration_sec(start_time_sec));

        if !is_system_store(&store_name) {
            if let Err(e) = self.cleaner.delete_one_store_version(&store_name, version).await {
                warn!(
                    store = %store_name,
                    version,
                    error = %e,
                    "failed to delete errored store version"
                );
            }
        }
        info!(topic = %topic, "offline push failed");
    }

    // ── Store registry updates ───────────────────────────────────────────────

    async fn bring_version_online(
        &self,
        store_name: &str,
        version: u64,
    ) -> Result<(), MonitorError> {
        let mut store = self
            .stores
            .get_store(store_name)
            .await
            .ok_or_else(|| MonitorError::StoreNotFound(store_name.to_string()))?;
        let status = if store.enable_writes {
            VersionStatus::Online
        } else {
            VersionStatus::Pushed
        };
        store.update_version_status(version, status)?;
        if version > store.current_version {
            store.current_version = version;
        }
        self.stores.update_store(store.clone()).await?;

        if store.meta_system_store_enabled {
            if let Some(writer) = &self.meta_writer {
                if let Err(e) = writer.write_current_version_state(&store).await {
                    warn!(
                        store = %store.name,
                        error = %e,
                        "failed to write current version state record"
                    );
                }
            }
        }
        Ok(())
    }

    async fn update_store_version_status(
        &self,
        store_name: &str,
        version: u64,
        status: VersionStatus,
    ) -> Result<(), MonitorError> {
        let mut store = self
            .stores
            .get_store(store_name)
            .await
            .ok_or_else(|| MonitorError::StoreNotFound(store_name.to_string()))?;
        store.update_version_status(version, status)?;
        self.stores.update_store(store).await
    }

    // ── Status update discipline ─────────────────────────────────────────────

    /// Clone, validate the transition, persist, then swap into the map.
    ///
    /// Illegal transitions are skipped with a warning, and a failed durable
    /// write leaves the in-memory entry untouched. Returns whether the
    /// update was applied.
    async fn update_push_status(
        &self,
        pushes: &mut PushMap,
        push: OfflinePushStatus,
        new_status: ExecutionStatus,
        details: Option<String>,
    ) -> bool {
        let mut updated = push;
        if let Err(e) = updated.update_status(new_status, details) {
            warn!(error = %e, "skipping illegal push status transition");
            return false;
        }
        if let Err(e) = self.accessor.update_offline_push_status(&updated).await {
            error!(
                topic = %updated.kafka_topic,
                error = %e,
                "failed to persist push status update"
            );
            return false;
        }
        pushes.insert(updated.kafka_topic.clone(), updated);
        true
    }

    // ── Retention ────────────────────────────────────────────────────────────

    async fn retire_old_error_pushes_locked(
        self: &Arc<Self>,
        pushes: &mut PushMap,
        store_name: &str,
    ) {
        let to_retire = select_error_pushes_to_retire(
            pushes,
            store_name,
            self.config.max_error_pushes_to_keep,
        );
        for topic in to_retire {
            if let Some(push) = pushes.get(&topic).cloned() {
                info!(topic = %topic, "retiring old errored push");
                self.cleanup_push_status(pushes, &push).await;
            }
        }
    }

    /// Drop a push from the map, its partition-status subscription, and its
    /// durable record.
    async fn cleanup_push_status(
        self: &Arc<Self>,
        pushes: &mut PushMap,
        push: &OfflinePushStatus,
    ) {
        pushes.remove(&push.kafka_topic);
        self.accessor
            .unsubscribe_partition_status_change(&push.kafka_topic, &self.partition_listener())
            .await;
        if let Err(e) = self
            .accessor
            .delete_offline_push_status_and_its_partition_statuses(&push.kafka_topic)
            .await
        {
            warn!(topic = %push.kafka_topic, error = %e, "failed to delete push status durably");
        }
    }
}

fn push_duration_sec(start_time_sec: i64) -> i64 {
    (Utc::now().timestamp() - start_time_sec).max(0)
}

// ── Listener shims ───────────────────────────────────────────────────────────

#[async_trait]
impl PartitionStatusListener for OfflinePushMonitor {
    async fn on_partition_status_change(&self, topic: &str, partition_status: PartitionStatus) {
        let Some(monitor) = self.me.upgrade() else {
            return;
        };
        monitor
            .handle_partition_status_change(topic, partition_status)
            .await;
    }
}

#[async_trait]
impl RoutingDataChangedListener for OfflinePushMonitor {
    async fn on_external_view_change(&self, assignment: PartitionAssignment) {
        let Some(monitor) = self.me.upgrade() else {
            return;
        };
        monitor.handle_external_view_change(assignment).await;
    }

    async fn on_routing_data_deleted(&self, topic: &str) {
        let Some(monitor) = self.me.upgrade() else {
            return;
        };
        monitor.handle_routing_data_deleted(topic).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::InMemoryStoreRepository;
    use opal_domain::{HybridStoreConfig, Instance, Store};
    use opal_routing::{InMemoryRoutingRepository, PartitionReplicas, ReplicaState};
    use opal_store::{InMemoryPushAccessor, ReplicaStatus};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const WAIT_ALL: OfflinePushStrategy = OfflinePushStrategy::WaitAllReplicas;

    #[derive(Default)]
    struct RecordingCleaner {
        deleted_versions: Mutex<Vec<(String, u64)>>,
        cleaned_topics: Mutex<Vec<String>>,
        retired_stores: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StoreCleaner for RecordingCleaner {
        async fn delete_one_store_version(
            &self,
            store_name: &str,
            version: u64,
        ) -> Result<(), MonitorError> {
            self.deleted_versions
                .lock()
                .unwrap()
                .push((store_name.to_string(), version));
            Ok(())
        }

        async fn topic_cleanup_when_push_complete(&self, topic: &str) -> Result<(), MonitorError> {
            self.cleaned_topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }

        async fn retire_old_store_versions(&self, store_name: &str) -> Result<(), MonitorError> {
            self.retired_stores.lock().unwrap().push(store_name.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingReplicator {
        calls: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl TopicReplicator for RecordingReplicator {
        async fn prepare_and_start_replication(
            &self,
            real_time_topic: &str,
            version_topic: &str,
            _store: &Store,
        ) -> Result<(), MonitorError> {
            self.calls
                .lock()
                .unwrap()
                .push((real_time_topic.to_string(), version_topic.to_string()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(MonitorError::Internal("replication refused".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStats {
        successes: Mutex<Vec<String>>,
        failures: Mutex<Vec<String>>,
    }

    impl PushHealthStats for RecordingStats {
        fn record_successful_push(&self, store_name: &str, _duration_sec: i64) {
            self.successes.lock().unwrap().push(store_name.to_string());
        }

        fn record_failed_push(&self, store_name: &str, _duration_sec: i64) {
            self.failures.lock().unwrap().push(store_name.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingMetaWriter {
        records: Mutex<Vec<(String, u64)>>,
    }

    #[async_trait]
    impl MetaStoreWriter for RecordingMetaWriter {
        async fn write_current_version_state(&self, store: &Store) -> Result<(), MonitorError> {
            self.records
                .lock()
                .unwrap()
                .push((store.name.clone(), store.current_version));
            Ok(())
        }
    }

    struct Harness {
        monitor: Arc<OfflinePushMonitor>,
        accessor: Arc<InMemoryPushAccessor>,
        routing: Arc<InMemoryRoutingRepository>,
        stores: Arc<InMemoryStoreRepository>,
        cleaner: Arc<RecordingCleaner>,
        replicator: Arc<RecordingReplicator>,
        stats: Arc<RecordingStats>,
        meta_writer: Arc<RecordingMetaWriter>,
    }

    impl Harness {
        fn with_config(config: MonitorConfig) -> Self {
            let accessor = Arc::new(InMemoryPushAccessor::new());
            let routing = Arc::new(InMemoryRoutingRepository::new());
            let stores = Arc::new(InMemoryStoreRepository::new());
            let cleaner = Arc::new(RecordingCleaner::default());
            let replicator = Arc::new(RecordingReplicator::default());
            let stats = Arc::new(RecordingStats::default());
            let meta_writer = Arc::new(RecordingMetaWriter::default());
            let monitor = OfflinePushMonitor::new(
                accessor.clone(),
                routing.clone(),
                DeciderRegistry::with_defaults(),
                stores.clone(),
                cleaner.clone(),
                stats.clone(),
                Some(replicator.clone()),
                Some(meta_writer.clone()),
                config,
            );
            Harness {
                monitor,
                accessor,
                routing,
                stores,
                cleaner,
                replicator,
                stats,
                meta_writer,
            }
        }

        fn new() -> Self {
            Self::with_config(MonitorConfig::default())
        }

        async fn seed_store(&self, name: &str, versions: &[u64]) {
            let mut store = Store::new(name);
            for v in versions {
                store.add_version(*v);
            }
            self.stores.put_store(store).await;
        }

        async fn current_status(&self, topic: &str) -> ExecutionStatus {
            self.monitor.get_push_status_and_details(topic, None).await.0
        }
    }

    fn assignment(topic: &str, partitions: u32, online: usize, errored: usize) -> PartitionAssignment {
        let mut a = PartitionAssignment::new(topic, partitions);
        for id in 0..partitions {
            let mut p = PartitionReplicas::new(id);
            for i in 0..online {
                p.add_instance(ReplicaState::Online, Instance::new(format!("ok{}", i), 80));
            }
            for i in 0..errored {
                p.add_instance(ReplicaState::Error, Instance::new(format!("bad{}", i), 80));
            }
            a.add_partition(p);
        }
        a
    }

    fn partition_status(partition_id: u32, replicas: &[(&str, ExecutionStatus, u64)]) -> PartitionStatus {
        let mut status = PartitionStatus::new(partition_id);
        for (node, replica_status, messages) in replicas {
            let mut replica = ReplicaStatus::new(*node);
            replica.current_status = *replica_status;
            replica.messages_consumed = *messages;
            status.update_replica_status(replica);
        }
        status
    }

    #[tokio::test]
    async fn happy_path_completes_push_and_brings_version_online() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 2, 2, WAIT_ALL)
            .await
            .unwrap();

        h.routing.apply_external_view(assignment("s_v1", 2, 2, 0)).await;

        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Completed);
        let store = h.stores.get_store("s").await.unwrap();
        assert_eq!(store.current_version, 1);
        assert_eq!(store.version(1).unwrap().status, VersionStatus::Online);
        assert_eq!(h.cleaner.cleaned_topics.lock().unwrap().as_slice(), &["s_v1".to_string()]);
        assert_eq!(h.cleaner.retired_stores.lock().unwrap().as_slice(), &["s".to_string()]);
        assert_eq!(h.stats.successes.lock().unwrap().as_slice(), &["s".to_string()]);
        // The push stays visible, but routing is no longer watched.
        assert!(h.monitor.get_offline_push("s_v1").await.is_ok());
        assert_eq!(h.routing.listener_count("s_v1").await, 0);

        // A late routing event cannot reopen the terminal state.
        h.routing.apply_external_view(assignment("s_v1", 2, 0, 2)).await;
        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn failure_path_marks_version_error_and_deletes_it() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 2, 2, WAIT_ALL)
            .await
            .unwrap();

        h.routing.apply_external_view(assignment("s_v1", 2, 1, 1)).await;

        let (status, details) = h.monitor.get_push_status_and_details("s_v1", None).await;
        assert_eq!(status, ExecutionStatus::Error);
        assert!(details.unwrap().contains("errored replicas"));
        let store = h.stores.get_store("s").await.unwrap();
        assert_eq!(store.version(1).unwrap().status, VersionStatus::Error);
        assert_eq!(
            h.cleaner.deleted_versions.lock().unwrap().as_slice(),
            &[("s".to_string(), 1)]
        );
        assert_eq!(h.stats.failures.lock().unwrap().as_slice(), &["s".to_string()]);
    }

    #[tokio::test]
    async fn system_store_failure_skips_version_deletion() {
        let h = Harness::new();
        let store_name = format!("{}meta", opal_domain::SYSTEM_STORE_PREFIX);
        h.seed_store(&store_name, &[1]).await;
        let topic = opal_domain::version_topic(&store_name, 1);
        h.monitor
            .start_monitor_offline_push(&topic, 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.monitor
            .mark_offline_push_as_error(&topic, "node lost".to_string())
            .await;

        assert_eq!(h.current_status(&topic).await, ExecutionStatus::Error);
        assert!(h.cleaner.deleted_versions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn routing_deletion_is_ignored_while_resource_in_ideal_state() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.routing.set_ideal_state("s_v1", true).await;

        h.routing.delete_routing_data("s_v1").await;

        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Started);
    }

    #[tokio::test]
    async fn routing_deletion_fails_started_push_when_resource_gone() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.routing.delete_routing_data("s_v1").await;

        let (status, details) = h.monitor.get_push_status_and_details("s_v1", None).await;
        assert_eq!(status, ExecutionStatus::Error);
        assert!(details.unwrap().contains("is deleted"));
    }

    #[tokio::test]
    async fn retention_caps_error_pushes_per_store() {
        let h = Harness::new();
        h.seed_store("s", &[1, 2, 3, 4, 5, 6, 7, 8]).await;
        for v in 1..=7u64 {
            let topic = opal_domain::version_topic("s", v);
            h.monitor
                .start_monitor_offline_push(&topic, 1, 1, WAIT_ALL)
                .await
                .unwrap();
            h.monitor
                .mark_offline_push_as_error(&topic, "ingestion failed".to_string())
                .await;
        }
        h.monitor
            .start_monitor_offline_push("s_v8", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.monitor.retire_old_error_pushes("s").await;

        for v in 1..=2u64 {
            let topic = opal_domain::version_topic("s", v);
            assert!(h.monitor.get_offline_push(&topic).await.is_err(), "{topic} should be retired");
            assert!(h
                .accessor
                .get_offline_push_status_and_its_partition_statuses(&topic)
                .await
                .is_err());
        }
        for v in 3..=7u64 {
            let topic = opal_domain::version_topic("s", v);
            assert_eq!(h.current_status(&topic).await, ExecutionStatus::Error);
        }
        assert_eq!(h.current_status("s_v8").await, ExecutionStatus::Started);
    }

    #[tokio::test]
    async fn hybrid_push_kicks_off_buffer_replay_exactly_once() {
        let h = Harness::new();
        let mut store = Store::new("h");
        store.add_version(1);
        store.hybrid_config = Some(HybridStoreConfig {
            rewind_seconds: 3600,
            offset_lag_threshold: 1000,
        });
        h.stores.put_store(store).await;
        h.monitor
            .start_monitor_offline_push("h_v1", 1, 2, WAIT_ALL)
            .await
            .unwrap();

        h.accessor
            .write_partition_status(
                "h_v1",
                partition_status(
                    0,
                    &[
                        ("a_1", ExecutionStatus::EndOfPushReceived, 100),
                        ("b_1", ExecutionStatus::EndOfPushReceived, 100),
                    ],
                ),
            )
            .await;

        let (status, details) = h.monitor.get_push_status_and_details("h_v1", None).await;
        assert_eq!(status, ExecutionStatus::EndOfPushReceived);
        assert_eq!(details.as_deref(), Some("kicked off buffer replay"));
        assert_eq!(
            h.replicator.calls.lock().unwrap().as_slice(),
            &[("h_rt".to_string(), "h_v1".to_string())]
        );

        // Further progress reports must not re-kick replication.
        h.accessor
            .write_partition_status(
                "h_v1",
                partition_status(
                    0,
                    &[
                        ("a_1", ExecutionStatus::EndOfPushReceived, 200),
                        ("b_1", ExecutionStatus::EndOfPushReceived, 200),
                    ],
                ),
            )
            .await;
        assert_eq!(h.replicator.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hybrid_push_skips_replay_when_configured() {
        let config = MonitorConfig {
            skip_buffer_replay_for_hybrid: true,
            ..MonitorConfig::default()
        };
        let h = Harness::with_config(config);
        let mut store = Store::new("h");
        store.add_version(1);
        store.hybrid_config = Some(HybridStoreConfig {
            rewind_seconds: 3600,
            offset_lag_threshold: 1000,
        });
        h.stores.put_store(store).await;
        h.monitor
            .start_monitor_offline_push("h_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.accessor
            .write_partition_status(
                "h_v1",
                partition_status(0, &[("a_1", ExecutionStatus::EndOfPushReceived, 10)]),
            )
            .await;

        let (status, details) = h.monitor.get_push_status_and_details("h_v1", None).await;
        assert_eq!(status, ExecutionStatus::EndOfPushReceived);
        assert_eq!(details.as_deref(), Some("skipped buffer replay"));
        assert!(h.replicator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hybrid_push_without_replicator_fails() {
        let h = Harness::new();
        let monitor = OfflinePushMonitor::new(
            h.accessor.clone(),
            h.routing.clone(),
            DeciderRegistry::with_defaults(),
            h.stores.clone(),
            h.cleaner.clone(),
            h.stats.clone(),
            None,
            None,
            MonitorConfig::default(),
        );
        let mut store = Store::new("h");
        store.add_version(1);
        store.hybrid_config = Some(HybridStoreConfig {
            rewind_seconds: 3600,
            offset_lag_threshold: 1000,
        });
        h.stores.put_store(store).await;
        monitor
            .start_monitor_offline_push("h_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.accessor
            .write_partition_status(
                "h_v1",
                partition_status(0, &[("a_1", ExecutionStatus::EndOfPushReceived, 10)]),
            )
            .await;

        let (status, details) = monitor.get_push_status_and_details("h_v1", None).await;
        assert_eq!(status, ExecutionStatus::Error);
        assert!(details.unwrap().contains("topic replicator"));
    }

    #[tokio::test]
    async fn hybrid_replicator_failure_fails_push() {
        let h = Harness::new();
        h.replicator.fail.store(true, Ordering::SeqCst);
        let mut store = Store::new("h");
        store.add_version(1);
        store.hybrid_config = Some(HybridStoreConfig {
            rewind_seconds: 3600,
            offset_lag_threshold: 1000,
        });
        h.stores.put_store(store).await;
        h.monitor
            .start_monitor_offline_push("h_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.accessor
            .write_partition_status(
                "h_v1",
                partition_status(0, &[("a_1", ExecutionStatus::EndOfPushReceived, 10)]),
            )
            .await;

        let (status, details) = h.monitor.get_push_status_and_details("h_v1", None).await;
        assert_eq!(status, ExecutionStatus::Error);
        assert_eq!(details.as_deref(), Some("Failed to kick off the buffer replay"));
    }

    #[tokio::test]
    async fn start_monitor_rejects_live_duplicate() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        let err = h
            .monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::PushAlreadyExists(_)));
    }

    #[tokio::test]
    async fn start_monitor_replaces_errored_predecessor() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .mark_offline_push_as_error("s_v1", "bad batch".to_string())
            .await;

        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        let (status, details) = h.monitor.get_push_status_and_details("s_v1", None).await;
        assert_eq!(status, ExecutionStatus::Started);
        assert!(details.is_none());
    }

    #[tokio::test]
    async fn stop_monitor_removes_push_and_subscriptions() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        assert_eq!(h.routing.listener_count("s_v1").await, 1);
        assert_eq!(h.accessor.listener_count("s_v1").await, 1);

        h.monitor.stop_monitor_offline_push("s_v1", true).await.unwrap();

        assert!(matches!(
            h.monitor.get_offline_push("s_v1").await,
            Err(MonitorError::PushNotFound(_))
        ));
        assert!(h
            .accessor
            .get_offline_push_status_and_its_partition_statuses("s_v1")
            .await
            .is_err());
        assert_eq!(h.routing.listener_count("s_v1").await, 0);
        assert_eq!(h.accessor.listener_count("s_v1").await, 0);

        // Stopping an unknown topic is a warning, not an error.
        h.monitor.stop_monitor_offline_push("s_v1", true).await.unwrap();
    }

    #[tokio::test]
    async fn stop_all_monitoring_keeps_durable_statuses() {
        let h = Harness::new();
        h.seed_store("a", &[1]).await;
        h.seed_store("b", &[1]).await;
        h.monitor
            .start_monitor_offline_push("a_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .start_monitor_offline_push("b_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.monitor.stop_all_monitoring().await;

        assert!(h.monitor.get_offline_push("a_v1").await.is_err());
        assert!(h.monitor.get_offline_push("b_v1").await.is_err());
        // delete_push_status=false leaves the durable records alone.
        assert!(h
            .accessor
            .get_offline_push_status_and_its_partition_statuses("a_v1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn cleanup_store_status_removes_every_push_of_the_store() {
        let h = Harness::new();
        h.seed_store("s", &[1, 2]).await;
        h.seed_store("other", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .start_monitor_offline_push("s_v2", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .start_monitor_offline_push("other_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.monitor.cleanup_store_status("s").await;

        assert!(h.monitor.get_offline_push("s_v1").await.is_err());
        assert!(h.monitor.get_offline_push("s_v2").await.is_err());
        assert!(h.monitor.get_offline_push("other_v1").await.is_ok());
        assert!(h
            .accessor
            .get_offline_push_status_and_its_partition_statuses("s_v1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_topic_reads_as_not_created() {
        let h = Harness::new();
        let (status, details) = h.monitor.get_push_status_and_details("nope_v1", None).await;
        assert_eq!(status, ExecutionStatus::NotCreated);
        assert!(details.is_some());
    }

    #[tokio::test]
    async fn incremental_version_delegates_to_per_push_check() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        let mut status = partition_status(0, &[("a_1", ExecutionStatus::Started, 5)]);
        status
            .replica_statuses
            .get_mut("a_1")
            .unwrap()
            .incremental_push_version = Some("ip_1".to_string());
        h.accessor.write_partition_status("s_v1", status).await;

        let (inc_status, _) = h.monitor.get_push_status_and_details("s_v1", Some("ip_1")).await;
        assert_eq!(inc_status, ExecutionStatus::Completed);
        let (missing, _) = h.monitor.get_push_status_and_details("s_v1", Some("ip_2")).await;
        assert_eq!(missing, ExecutionStatus::NotCreated);
    }

    #[tokio::test]
    async fn mark_error_is_idempotent_on_terminal_push() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.monitor
            .mark_offline_push_as_error("s_v1", "first failure".to_string())
            .await;
        h.monitor
            .mark_offline_push_as_error("s_v1", "second failure".to_string())
            .await;

        let (status, details) = h.monitor.get_push_status_and_details("s_v1", None).await;
        assert_eq!(status, ExecutionStatus::Error);
        assert_eq!(details.as_deref(), Some("first failure"));
        assert_eq!(h.stats.failures.lock().unwrap().len(), 1);
        assert_eq!(h.cleaner.deleted_versions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn progress_filters_replicas_on_dead_instances() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 2, WAIT_ALL)
            .await
            .unwrap();
        h.accessor
            .write_partition_status(
                "s_v1",
                partition_status(
                    0,
                    &[
                        ("a_1", ExecutionStatus::Started, 10),
                        ("b_1", ExecutionStatus::Started, 20),
                    ],
                ),
            )
            .await;
        h.routing.add_live_instance(Instance::new("a", 1)).await;

        let progress = h.monitor.get_offline_push_progress("s_v1").await.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress.get("a_1_0"), Some(&10));
    }

    #[tokio::test]
    async fn would_job_fail_is_a_pure_dry_run() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        let doomed = assignment("s_v1", 1, 0, 1);
        assert!(h.monitor.would_job_fail("s_v1", &doomed).await.unwrap());
        let healthy = assignment("s_v1", 1, 1, 0);
        assert!(!h.monitor.would_job_fail("s_v1", &healthy).await.unwrap());
        // The dry run changed nothing.
        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Started);
        assert!(h.monitor.would_job_fail("missing_v1", &healthy).await.is_err());
    }

    #[tokio::test]
    async fn ongoing_pushes_lists_started_topics_only() {
        let h = Harness::new();
        h.seed_store("s", &[1, 2]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .start_monitor_offline_push("s_v2", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .mark_offline_push_as_error("s_v1", "boom".to_string())
            .await;

        let ongoing = h.monitor.get_topics_of_ongoing_offline_pushes().await;
        assert_eq!(ongoing, vec!["s_v2".to_string()]);
    }

    #[tokio::test]
    async fn writes_disabled_store_parks_completed_version_as_pushed() {
        let h = Harness::new();
        let mut store = Store::new("s");
        store.add_version(1);
        store.enable_writes = false;
        h.stores.put_store(store).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.routing.apply_external_view(assignment("s_v1", 1, 1, 0)).await;

        let store = h.stores.get_store("s").await.unwrap();
        assert_eq!(store.version(1).unwrap().status, VersionStatus::Pushed);
    }

    #[tokio::test]
    async fn completion_emits_meta_store_record_when_enabled() {
        let h = Harness::new();
        let mut store = Store::new("s");
        store.add_version(1);
        store.meta_system_store_enabled = true;
        h.stores.put_store(store).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.routing.apply_external_view(assignment("s_v1", 1, 1, 0)).await;

        assert_eq!(
            h.meta_writer.records.lock().unwrap().as_slice(),
            &[("s".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn current_version_never_moves_backwards() {
        let h = Harness::new();
        let mut store = Store::new("s");
        store.add_version(1);
        store.add_version(5);
        store.current_version = 5;
        h.stores.put_store(store).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();

        h.routing.apply_external_view(assignment("s_v1", 1, 1, 0)).await;

        let store = h.stores.get_store("s").await.unwrap();
        assert_eq!(store.current_version, 5);
        assert_eq!(store.version(1).unwrap().status, VersionStatus::Online);
    }

    #[tokio::test]
    async fn load_all_pushes_decides_terminal_and_keeps_legacy() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        let started = OfflinePushStatus::new("s_v1", 1, 1, WAIT_ALL);
        h.accessor
            .create_offline_push_status_and_its_partition_statuses(&started)
            .await
            .unwrap();
        let legacy = OfflinePushStatus::new("old_v3", 1, 1, WAIT_ALL);
        h.accessor
            .create_offline_push_status_and_its_partition_statuses(&legacy)
            .await
            .unwrap();
        // Routing already shows s_v1 fully online; old_v3 has no routing data.
        h.routing.apply_external_view(assignment("s_v1", 1, 1, 0)).await;

        let initial = h
            .accessor
            .load_offline_push_statuses_and_partition_statuses()
            .await
            .unwrap();
        h.monitor.load_all_pushes(initial).await.unwrap();

        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Completed);
        let store = h.stores.get_store("s").await.unwrap();
        assert_eq!(store.version(1).unwrap().status, VersionStatus::Online);
        // The legacy push is kept, still monitored, and untouched.
        assert_eq!(h.current_status("old_v3").await, ExecutionStatus::Started);
        assert_eq!(h.routing.listener_count("old_v3").await, 1);
        assert_eq!(h.routing.listener_count("s_v1").await, 0);
    }

    #[tokio::test]
    async fn refresh_and_update_skips_illegal_transition() {
        let h = Harness::new();
        h.seed_store("s", &[1]).await;
        h.monitor
            .start_monitor_offline_push("s_v1", 1, 1, WAIT_ALL)
            .await
            .unwrap();
        h.monitor
            .mark_offline_push_as_error("s_v1", "boom".to_string())
            .await;

        // Error → Started is illegal; the wrapper must leave state alone.
        h.monitor
            .refresh_and_update_push_status("s_v1", ExecutionStatus::Started, None)
            .await
            .unwrap();
        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Error);

        // Error → Archived is legal.
        h.monitor
            .refresh_and_update_push_status("s_v1", ExecutionStatus::Archived, None)
            .await
            .unwrap();
        assert_eq!(h.current_status("s_v1").await, ExecutionStatus::Archived);
    }
}
