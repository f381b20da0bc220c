mod raw;
mod loader;
pub mod error;

pub use error::ConfigError;
pub use loader::{load_monitor_config, MonitorConfig, DEFAULT_MAX_ERROR_PUSHES_TO_KEEP};
