// Domain Layer - Pure probe data model

pub mod batch;
pub mod error;
pub mod host;
pub mod normalize;
pub mod observation;
pub mod platform;

// Re-exports
pub use batch::{Batch, SkippedProbe};
pub use error::DomainError;
pub use host::validate_host;
pub use normalize::{normalize, normalize_bytes};
pub use observation::{
    CommandOutput, Observation, ObservationPoint, PendingObservation, NOT_EXECUTED, SIGNALED,
    SPAWN_FAILED,
};
pub use platform::Platform;
