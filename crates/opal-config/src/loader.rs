use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::raw::RawMonitorConfig;

pub const DEFAULT_MAX_ERROR_PUSHES_TO_KEEP: usize = 5;

/// Validated monitor configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub cluster_name: String,
    /// At most this many error pushes are retained per store before the
    /// lifecycle gardener retires the oldest ones.
    pub max_error_pushes_to_keep: usize,
    pub skip_buffer_replay_for_hybrid: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            cluster_name: "local".to_string(),
            max_error_pushes_to_keep: DEFAULT_MAX_ERROR_PUSHES_TO_KEEP,
            skip_buffer_replay_for_hybrid: false,
        }
    }
}

/// Load the monitor config from a YAML file.
pub fn load_monitor_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawMonitorConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.display().to_string(),
            source: e,
        })?;
    debug!("Loaded monitor config from {}", path.display());
    convert(raw, path)
}

fn convert(raw: RawMonitorConfig, path: &Path) -> Result<MonitorConfig, ConfigError> {
    if raw.cluster.trim().is_empty() {
        return Err(ConfigError::Invalid {
            path: path.display().to_string(),
            message: "cluster must not be empty".to_string(),
        });
    }
    Ok(MonitorConfig {
        cluster_name: raw.cluster,
        max_error_pushes_to_keep: raw
            .max_error_pushes_to_keep
            .unwrap_or(DEFAULT_MAX_ERROR_PUSHES_TO_KEEP),
        skip_buffer_replay_for_hybrid: raw.skip_buffer_replay_for_hybrid.unwrap_or(false),
    })
}
