use std::collections::HashMap;
use std::sync::Arc;

use opal_domain::OfflinePushStrategy;

use crate::decider::PushStatusDecider;
use crate::error::DeciderError;
use crate::wait_all::WaitAllReplicasDecider;
use crate::wait_n_minus_one::WaitNMinusOneDecider;

/// Dispatches status checks to the [`PushStatusDecider`] matching a push's
/// strategy tag.
#[derive(Default)]
pub struct DeciderRegistry {
    deciders: HashMap<OfflinePushStrategy, Arc<dyn PushStatusDecider>>,
}

impl DeciderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a decider for every known strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            OfflinePushStrategy::WaitAllReplicas,
            Arc::new(WaitAllReplicasDecider::new()),
        );
        registry.register(
            OfflinePushStrategy::WaitNMinusOneReplicaPerPartition,
            Arc::new(WaitNMinusOneDecider::new()),
        );
        registry
    }

    /// Register a decider for a strategy. Returns `&mut self` for chaining.
    pub fn register(
        &mut self,
        strategy: OfflinePushStrategy,
        decider: Arc<dyn PushStatusDecider>,
    ) -> &mut Self {
        self.deciders.insert(strategy, decider);
        self
    }

    pub fn for_strategy(
        &self,
        strategy: OfflinePushStrategy,
    ) -> Result<Arc<dyn PushStatusDecider>, DeciderError> {
        self.deciders
            .get(&strategy)
            .cloned()
            .ok_or(DeciderError::StrategyNotConfigured(strategy))
    }

    pub fn registered_strategies(&self) -> Vec<OfflinePushStrategy> {
        self.deciders.keys().copied().collect()
    }
}
