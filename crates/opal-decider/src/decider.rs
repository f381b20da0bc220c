use opal_domain::{ExecutionStatus, Instance};
use opal_routing::PartitionAssignment;
use opal_store::OfflinePushStatus;

/// Decides, from a push snapshot and the current partition assignment,
/// whether the push is done, doomed, or still running.
///
/// One implementation per [`opal_domain::OfflinePushStrategy`]; the monitor
/// dispatches through the [`crate::DeciderRegistry`] and never inspects the
/// strategy itself.
pub trait PushStatusDecider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Errored replicas tolerated per partition before the push is doomed.
    /// The same count is subtracted from the replicas required to serve.
    fn tolerated_replica_failures(&self) -> u32;

    /// Terminal decision or Started (no change).
    fn check_push_status_and_details(
        &self,
        push: &OfflinePushStatus,
        assignment: &PartitionAssignment,
    ) -> (ExecutionStatus, Option<String>) {
        let tolerated = self.tolerated_replica_failures();
        let required =
            std::cmp::max(push.replication_factor.saturating_sub(tolerated), 1) as usize;
        let mut all_partitions_ready = true;

        for partition_id in 0..push.partition_count {
            let Some(partition) = assignment.partition(partition_id) else {
                // Not yet assigned; the push cannot complete, and absence is
                // not evidence of failure.
                all_partitions_ready = false;
                continue;
            };
            let errored = partition.error_instances().len();
            if errored > tolerated as usize {
                let details = format!(
                    "partition {} has {} errored replicas, exceeding the tolerated {}",
                    partition_id, errored, tolerated
                );
                return (ExecutionStatus::Error, Some(details));
            }
            if partition.online_instances().len() < required {
                all_partitions_ready = false;
            }
        }

        if all_partitions_ready {
            (ExecutionStatus::Completed, None)
        } else {
            (ExecutionStatus::Started, None)
        }
    }

    /// Replicas the query router may scatter to for `partition_id`.
    fn ready_to_serve_instances(
        &self,
        assignment: &PartitionAssignment,
        partition_id: u32,
    ) -> Vec<Instance> {
        assignment
            .partition(partition_id)
            .map(|p| p.online_instances().to_vec())
            .unwrap_or_default()
    }
}
