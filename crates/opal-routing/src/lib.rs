pub mod assignment;
pub mod error;
pub mod memory;
pub mod repository;

pub use assignment::{PartitionAssignment, PartitionReplicas, ReplicaState};
pub use error::RoutingError;
pub use memory::InMemoryRoutingRepository;
pub use repository::{RoutingDataChangedListener, RoutingDataRepository};
