use serde::{Deserialize, Serialize};

// ── Execution status ─────────────────────────────────────────────────────────

/// The lifecycle state of an offline push (and of a single replica within it).
///
/// Transitions:
///   NotCreated → Started
///   Started → EndOfPushReceived | Completed | Error
///   EndOfPushReceived → Completed | Error
///   Completed | Error → Archived
///
/// Completed, Error and Archived are terminal; a push never leaves them
/// except for the one-way Completed/Error → Archived hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Known to the caller but no push has been started for it.
    #[default]
    NotCreated,
    /// Push created; replicas are consuming the version topic.
    Started,
    /// Every required replica saw the end-of-push control message.
    EndOfPushReceived,
    /// Enough replicas are ready to serve; the push succeeded.
    Completed,
    /// The push failed; `status_details` carries the reason.
    Error,
    /// Terminal status retired by the lifecycle gardener.
    Archived,
}

impl ExecutionStatus {
    /// Statuses this status may legally move to.
    pub fn valid_target_statuses(&self) -> &[ExecutionStatus] {
        match self {
            ExecutionStatus::NotCreated => &[ExecutionStatus::Started],
            ExecutionStatus::Started => &[
                ExecutionStatus::EndOfPushReceived,
                ExecutionStatus::Completed,
                ExecutionStatus::Error,
            ],
            ExecutionStatus::EndOfPushReceived => {
                &[ExecutionStatus::Completed, ExecutionStatus::Error]
            }
            ExecutionStatus::Completed => &[ExecutionStatus::Archived],
            ExecutionStatus::Error => &[ExecutionStatus::Archived],
            ExecutionStatus::Archived => &[],
        }
    }

    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        self.valid_target_statuses().contains(&next)
    }

    /// Completed, Error and Archived never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Error | ExecutionStatus::Archived
        )
    }

    /// Whether a replica in this status has consumed the entire bulk push.
    pub fn has_reached_end_of_push(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::EndOfPushReceived | ExecutionStatus::Completed
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::NotCreated => "not_created",
            ExecutionStatus::Started => "started",
            ExecutionStatus::EndOfPushReceived => "end_of_push_received",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

// ── Push strategy ────────────────────────────────────────────────────────────

/// How many healthy replicas a partition needs before the push is declared
/// Completed, and how many errored replicas it tolerates before Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflinePushStrategy {
    /// Every replica of every partition must be ready to serve.
    WaitAllReplicas,
    /// One replica per partition may lag or fail.
    WaitNMinusOneReplicaPerPartition,
}

impl std::fmt::Display for OfflinePushStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfflinePushStrategy::WaitAllReplicas => write!(f, "wait_all_replicas"),
            OfflinePushStrategy::WaitNMinusOneReplicaPerPartition => {
                write!(f, "wait_n_minus_one_replica_per_partition")
            }
        }
    }
}

// ── Version status ───────────────────────────────────────────────────────────

/// Status of one dataset version in the store registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Version created; its push is in flight.
    Started,
    /// Push finished but the store has writes disabled, so the version is
    /// parked instead of going online.
    Pushed,
    /// Version is serving queries.
    Online,
    /// The push for this version failed.
    Error,
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VersionStatus::Started => "started",
            VersionStatus::Pushed => "pushed",
            VersionStatus::Online => "online",
            VersionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// ── Serving instance ─────────────────────────────────────────────────────────

/// One serving node in the cluster. `node_id` is `<host>_<port>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

impl Instance {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Instance {
            node_id: format!("{}_{}", host, port),
            host,
            port,
        }
    }
}

impl std::fmt::Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node_id)
    }
}

// ── Topic naming ─────────────────────────────────────────────────────────────

const VERSION_TOPIC_SEPARATOR: &str = "_v";
const REAL_TIME_TOPIC_SUFFIX: &str = "_rt";

/// Name of the version topic carrying the bulk push for `store`/`version`.
pub fn version_topic(store_name: &str, version: u64) -> String {
    format!("{}{}{}", store_name, VERSION_TOPIC_SEPARATOR, version)
}

/// Name of the real-time topic a hybrid store keeps ingesting from.
pub fn real_time_topic(store_name: &str) -> String {
    format!("{}{}", store_name, REAL_TIME_TOPIC_SUFFIX)
}

/// Parse `<store>_v<version>` back into its parts.
///
/// Total over arbitrary input: malformed names return `InvalidTopicName`
/// instead of panicking, since topics arrive from external feeds.
pub fn parse_version_topic(topic: &str) -> Result<(String, u64), crate::error::DomainError> {
    let idx = topic
        .rfind(VERSION_TOPIC_SEPARATOR)
        .ok_or_else(|| crate::error::DomainError::InvalidTopicName(topic.to_string()))?;
    let store_name = &topic[..idx];
    let version_part = &topic[idx + VERSION_TOPIC_SEPARATOR.len()..];
    if store_name.is_empty() {
        return Err(crate::error::DomainError::InvalidTopicName(topic.to_string()));
    }
    let version = version_part
        .parse::<u64>()
        .map_err(|_| crate::error::DomainError::InvalidTopicName(topic.to_string()))?;
    Ok((store_name.to_string(), version))
}

/// Store name embedded in a version topic.
pub fn parse_store_from_topic(topic: &str) -> Result<String, crate::error::DomainError> {
    parse_version_topic(topic).map(|(store, _)| store)
}

// ── System stores ────────────────────────────────────────────────────────────

/// Prefix of internal stores (e.g. per-store metadata stores). Failed pushes
/// of system stores skip version deletion.
pub const SYSTEM_STORE_PREFIX: &str = "opal_system_store_";

pub fn is_system_store(store_name: &str) -> bool {
    store_name.starts_with(SYSTEM_STORE_PREFIX)
}

// ── Store registry entries ───────────────────────────────────────────────────

/// Real-time ingestion settings of a hybrid store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridStoreConfig {
    /// How far back in the real-time topic buffer replay rewinds.
    pub rewind_seconds: u64,
    /// Max lag before a hybrid replica is considered caught up.
    pub offset_lag_threshold: u64,
}

/// One dataset version of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub number: u64,
    pub status: VersionStatus,
}

impl Version {
    pub fn new(number: u64) -> Self {
        Version {
            number,
            status: VersionStatus::Started,
        }
    }
}

/// Catalog entry for one store: its versions and serving settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub name: String,
    /// The version currently serving queries. 0 means none yet.
    pub current_version: u64,
    pub versions: Vec<Version>,
    /// Stores with writes disabled park completed versions as Pushed
    /// instead of bringing them Online.
    pub enable_writes: bool,
    /// Present iff the store keeps ingesting from a real-time topic after
    /// the bulk push.
    pub hybrid_config: Option<HybridStoreConfig>,
    /// Whether current-version state records are mirrored into the store's
    /// metadata system store.
    pub meta_system_store_enabled: bool,
}

impl Store {
    pub fn new(name: impl Into<String>) -> Self {
        Store {
            name: name.into(),
            current_version: 0,
            versions: Vec::new(),
            enable_writes: true,
            hybrid_config: None,
            meta_system_store_enabled: false,
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid_config.is_some()
    }

    pub fn is_system_store(&self) -> bool {
        is_system_store(&self.name)
    }

    pub fn version(&self, number: u64) -> Option<&Version> {
        self.versions.iter().find(|v| v.number == number)
    }

    /// Add a version in Started status. No-op if the number already exists.
    pub fn add_version(&mut self, number: u64) {
        if self.version(number).is_none() {
            self.versions.push(Version::new(number));
        }
    }

    pub fn update_version_status(
        &mut self,
        number: u64,
        status: VersionStatus,
    ) -> Result<(), crate::error::DomainError> {
        let store_name = self.name.clone();
        let version = self
            .versions
            .iter_mut()
            .find(|v| v.number == number)
            .ok_or(crate::error::DomainError::VersionNotFound {
                store: store_name,
                version: number,
            })?;
        version.status = status;
        Ok(())
    }
}
