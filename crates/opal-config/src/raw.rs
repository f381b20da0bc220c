use serde::Deserialize;

/// Monitor config exactly as written in YAML, before defaults are applied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMonitorConfig {
    pub cluster: String,
    /// Retention cap for terminal error pushes per store.
    pub max_error_pushes_to_keep: Option<usize>,
    /// Hybrid stores transition straight to end-of-push without kicking off
    /// buffer replay.
    pub skip_buffer_replay_for_hybrid: Option<bool>,
}
