pub mod decider;
pub mod error;
pub mod registry;
pub mod wait_all;
pub mod wait_n_minus_one;

pub use decider::PushStatusDecider;
pub use error::DeciderError;
pub use registry::DeciderRegistry;
pub use wait_all::WaitAllReplicasDecider;
pub use wait_n_minus_one::WaitNMinusOneDecider;
