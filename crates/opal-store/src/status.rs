use std::collections::HashMap;

use chrono::Utc;
use opal_domain::{ExecutionStatus, OfflinePushStrategy};
use serde::{Deserialize, Serialize};

use crate::error::PushStoreError;

// ── ReplicaStatus ────────────────────────────────────────────────────────────

/// Progress of one replica (a partition on one serving node).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub node_id: String,
    pub current_status: ExecutionStatus,
    /// Messages consumed from the version topic so far.
    pub messages_consumed: u64,
    /// The latest incremental push this replica has fully received.
    pub incremental_push_version: Option<String>,
}

impl ReplicaStatus {
    pub fn new(node_id: impl Into<String>) -> Self {
        ReplicaStatus {
            node_id: node_id.into(),
            current_status: ExecutionStatus::Started,
            messages_consumed: 0,
            incremental_push_version: None,
        }
    }
}

// ── PartitionStatus ──────────────────────────────────────────────────────────

/// Replica statuses of one partition, keyed by serving node id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub partition_id: u32,
    pub replica_statuses: HashMap<String, ReplicaStatus>,
}

impl PartitionStatus {
    pub fn new(partition_id: u32) -> Self {
        PartitionStatus {
            partition_id,
            replica_statuses: HashMap::new(),
        }
    }

    /// Upsert one replica's status.
    pub fn update_replica_status(&mut self, replica: ReplicaStatus) {
        self.replica_statuses.insert(replica.node_id.clone(), replica);
    }

    pub fn replica_status(&self, node_id: &str) -> Option<&ReplicaStatus> {
        self.replica_statuses.get(node_id)
    }

    /// Replicas that have consumed the whole bulk push.
    pub fn replicas_past_end_of_push(&self) -> usize {
        self.replica_statuses
            .values()
            .filter(|r| r.current_status.has_reached_end_of_push())
            .count()
    }
}

// ── OfflinePushStatus ────────────────────────────────────────────────────────

/// Snapshot of one push's progress.
///
/// Treated as immutable once published in the monitor's map: mutation happens
/// on a clone which then replaces the map entry, so a reader holding a
/// snapshot outside the lock keeps a consistent view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflinePushStatus {
    pub kafka_topic: String,
    pub partition_count: u32,
    pub replication_factor: u32,
    pub strategy: OfflinePushStrategy,
    pub current_status: ExecutionStatus,
    pub status_details: Option<String>,
    pub start_time_sec: i64,
    /// partition id → replica statuses. Populated with an entry per
    /// partition from creation on.
    pub partition_statuses: HashMap<u32, PartitionStatus>,
}

impl OfflinePushStatus {
    pub fn new(
        kafka_topic: impl Into<String>,
        partition_count: u32,
        replication_factor: u32,
        strategy: OfflinePushStrategy,
    ) -> Self {
        let partition_statuses = (0..partition_count)
            .map(|id| (id, PartitionStatus::new(id)))
            .collect();
        OfflinePushStatus {
            kafka_topic: kafka_topic.into(),
            partition_count,
            replication_factor,
            strategy,
            current_status: ExecutionStatus::Started,
            status_details: None,
            start_time_sec: Utc::now().timestamp(),
            partition_statuses,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current_status.is_terminal()
    }

    pub fn validate_status_transition(&self, next: ExecutionStatus) -> bool {
        self.current_status.can_transition_to(next)
    }

    /// Move to `next`, recording `details` when provided.
    ///
    /// Illegal transitions leave the snapshot untouched and return an error;
    /// callers decide whether that is a warning (event path) or a bug.
    pub fn update_status(
        &mut self,
        next: ExecutionStatus,
        details: Option<String>,
    ) -> Result<(), PushStoreError> {
        if !self.validate_status_transition(next) {
            return Err(PushStoreError::IllegalStatusTransition {
                topic: self.kafka_topic.clone(),
                from: self.current_status,
                to: next,
            });
        }
        self.current_status = next;
        if details.is_some() {
            self.status_details = details;
        }
        Ok(())
    }

    /// Replace one partition's replica statuses.
    pub fn set_partition_status(
        &mut self,
        partition_status: PartitionStatus,
    ) -> Result<(), PushStoreError> {
        if partition_status.partition_id >= self.partition_count {
            return Err(PushStoreError::UnknownPartition {
                topic: self.kafka_topic.clone(),
                partition: partition_status.partition_id,
            });
        }
        self.partition_statuses
            .insert(partition_status.partition_id, partition_status);
        Ok(())
    }

    /// A hybrid push may hand over to buffer replay once every partition has
    /// `replication_factor` replicas past end-of-push and the push itself is
    /// still Started.
    pub fn is_ready_to_start_buffer_replay(&self) -> bool {
        if self.current_status != ExecutionStatus::Started {
            return false;
        }
        if self.partition_statuses.len() < self.partition_count as usize {
            return false;
        }
        self.partition_statuses
            .values()
            .all(|p| p.replicas_past_end_of_push() >= self.replication_factor as usize)
    }

    /// Status of one incremental push, derived from per-replica reports.
    ///
    /// Error if any replica errored; NotCreated if no replica has seen the
    /// version; Completed once every replica of the fully populated push
    /// reports it; Started otherwise.
    pub fn incremental_push_status(&self, version: &str) -> ExecutionStatus {
        let mut seen = 0usize;
        let mut total = 0usize;
        for partition in self.partition_statuses.values() {
            for replica in partition.replica_statuses.values() {
                total += 1;
                if replica.current_status == ExecutionStatus::Error {
                    return ExecutionStatus::Error;
                }
                if replica.incremental_push_version.as_deref() == Some(version) {
                    seen += 1;
                }
            }
        }
        let fully_populated = total >= (self.partition_count * self.replication_factor) as usize;
        if seen == 0 {
            ExecutionStatus::NotCreated
        } else if fully_populated && seen == total {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Started
        }
    }
}
