use crate::decider::PushStatusDecider;

/// Tolerates one lagging or failed replica per partition: the push completes
/// once each partition has `replication_factor - 1` replicas online, and only
/// two or more errored replicas in one partition doom it.
#[derive(Debug, Default, Clone)]
pub struct WaitNMinusOneDecider;

impl WaitNMinusOneDecider {
    pub fn new() -> Self {
        Self
    }
}

impl PushStatusDecider for WaitNMinusOneDecider {
    fn name(&self) -> &'static str {
        "wait_n_minus_one_replica_per_partition"
    }

    fn tolerated_replica_failures(&self) -> u32 {
        1
    }
}
