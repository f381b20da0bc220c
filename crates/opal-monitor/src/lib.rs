pub mod downstream;
pub mod error;
pub mod local;
pub mod monitor;
pub mod retention;
pub mod stats;

pub use downstream::{MetaStoreWriter, StoreCleaner, StoreRepository, TopicReplicator};
pub use error::MonitorError;
pub use local::{InMemoryStoreRepository, NoopStoreCleaner};
pub use monitor::OfflinePushMonitor;
pub use retention::select_error_pushes_to_retire;
pub use stats::{LoggingPushHealthStats, PushHealthStats};
