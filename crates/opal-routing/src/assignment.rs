use std::collections::HashMap;

use opal_domain::Instance;
use serde::{Deserialize, Serialize};

/// Role of one replica in the observed assignment (external view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaState {
    /// Caught up and serving.
    Online,
    /// Still catching up on the version topic.
    Bootstrap,
    /// The replica failed on this partition.
    Error,
    /// Assigned but not running.
    Offline,
}

impl std::fmt::Display for ReplicaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReplicaState::Online => "online",
            ReplicaState::Bootstrap => "bootstrap",
            ReplicaState::Error => "error",
            ReplicaState::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

/// The instances assigned to one partition, grouped by replica state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionReplicas {
    pub id: u32,
    instances_by_state: HashMap<ReplicaState, Vec<Instance>>,
}

impl PartitionReplicas {
    pub fn new(id: u32) -> Self {
        PartitionReplicas {
            id,
            instances_by_state: HashMap::new(),
        }
    }

    pub fn with_instance(mut self, state: ReplicaState, instance: Instance) -> Self {
        self.add_instance(state, instance);
        self
    }

    pub fn add_instance(&mut self, state: ReplicaState, instance: Instance) {
        self.instances_by_state.entry(state).or_default().push(instance);
    }

    pub fn instances_in_state(&self, state: ReplicaState) -> &[Instance] {
        self.instances_by_state
            .get(&state)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn online_instances(&self) -> &[Instance] {
        self.instances_in_state(ReplicaState::Online)
    }

    pub fn error_instances(&self) -> &[Instance] {
        self.instances_in_state(ReplicaState::Error)
    }

    pub fn all_instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances_by_state.values().flatten()
    }
}

/// The routing system's current partition → replica mapping for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionAssignment {
    pub topic: String,
    /// Partition count the resource was created with; the observed view may
    /// still be missing some of them.
    pub expected_partition_count: u32,
    partitions: HashMap<u32, PartitionReplicas>,
}

impl PartitionAssignment {
    pub fn new(topic: impl Into<String>, expected_partition_count: u32) -> Self {
        PartitionAssignment {
            topic: topic.into(),
            expected_partition_count,
            partitions: HashMap::new(),
        }
    }

    pub fn with_partition(mut self, partition: PartitionReplicas) -> Self {
        self.add_partition(partition);
        self
    }

    pub fn add_partition(&mut self, partition: PartitionReplicas) {
        self.partitions.insert(partition.id, partition);
    }

    pub fn partition(&self, id: u32) -> Option<&PartitionReplicas> {
        self.partitions.get(&id)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionReplicas> {
        self.partitions.values()
    }

    pub fn assigned_partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    pub fn is_missing_assigned_partitions(&self) -> bool {
        self.assigned_partition_count() < self.expected_partition_count
    }
}
