pub mod error;
pub mod types;

pub use error::DomainError;
pub use types::{
    is_system_store, parse_store_from_topic, parse_version_topic, real_time_topic, version_topic,
    ExecutionStatus, HybridStoreConfig, Instance, OfflinePushStrategy, Store, Version,
    VersionStatus, SYSTEM_STORE_PREFIX,
};
