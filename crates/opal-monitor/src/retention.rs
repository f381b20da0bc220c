use std::collections::HashMap;

use opal_domain::{parse_version_topic, ExecutionStatus};
use opal_store::OfflinePushStatus;

/// Topics of errored pushes to retire so `store_name` keeps at most
/// `max_to_keep` of them in the map.
///
/// Successful pushes are already retired through version retirement on
/// completion, so only accumulated errors are capped here. Candidates are
/// dropped smallest version first, which keeps the selection deterministic
/// across controller restarts.
pub fn select_error_pushes_to_retire(
    pushes: &HashMap<String, OfflinePushStatus>,
    store_name: &str,
    max_to_keep: usize,
) -> Vec<String> {
    let mut error_versions: Vec<u64> = pushes
        .values()
        .filter(|push| push.current_status == ExecutionStatus::Error)
        .filter_map(|push| match parse_version_topic(&push.kafka_topic) {
            Ok((store, version)) if store == store_name => Some(version),
            _ => None,
        })
        .collect();
    error_versions.sort_unstable();

    let excess = error_versions.len().saturating_sub(max_to_keep);
    error_versions
        .into_iter()
        .take(excess)
        .map(|version| opal_domain::version_topic(store_name, version))
        .collect()
}
