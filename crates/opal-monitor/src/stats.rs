use tracing::{info, warn};

/// Sink for push outcomes and durations.
pub trait PushHealthStats: Send + Sync + 'static {
    fn record_successful_push(&self, store_name: &str, duration_sec: i64);
    fn record_failed_push(&self, store_name: &str, duration_sec: i64);
}

/// Stats sink that only emits structured log lines.
#[derive(Debug, Default, Clone)]
pub struct LoggingPushHealthStats;

impl LoggingPushHealthStats {
    pub fn new() -> Self {
        Self
    }
}

impl PushHealthStats for LoggingPushHealthStats {
    fn record_successful_push(&self, store_name: &str, duration_sec: i64) {
        info!(store = %store_name, duration_sec, "push succeeded");
    }

    fn record_failed_push(&self, store_name: &str, duration_sec: i64) {
        warn!(store = %store_name, duration_sec, "push failed");
    }
}
