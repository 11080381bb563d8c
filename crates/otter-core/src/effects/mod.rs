//! Pure effect interfaces (no implementations)
//!
//! Handlers live in `otter-effects`; test doubles live in `otter-testkit`.

pub mod coordination;
pub mod random;
pub mod system;
pub mod task;
pub mod time;

pub use coordination::{
    CoordinationEffects, CoordinationError, Node, Revision, SetOptions, WatchAction, WatchEvent,
    WatchOptions,
};
pub use random::RandomEffects;
pub use system::{
    CapabilityError, FilesystemEffects, PackageEffects, PackageStatus, ReconcileEffects,
    RetrievalEffects, ServiceEffects,
};
pub use task::{CancellationToken, NeverCancel};
pub use time::{PhysicalTime, PhysicalTimeEffects, TimeError};
