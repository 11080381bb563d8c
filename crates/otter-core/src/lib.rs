//! Otter Core - desired state model and effect interfaces
//!
//! This crate holds the pure parts of Otter: the declarative state model,
//! reconciliation results, runtime configuration, and the effect traits that
//! handlers implement. It performs no IO of its own apart from reading
//! state and config files.
//!
//! # Layers
//!
//! ## State Model
//! - `Metadata`: entry identity `(name, kind, desiredState)`
//! - `StateVariant`: closed set of file, package and service entries
//! - `StateGraph`: validated, requirement-ordered entries
//!
//! ## Results
//! - `StateResult`: one outcome for one entry on one host
//! - `ResultMap`: outcomes grouped by host, deduplicated
//!
//! ## Effect Interfaces (Pure Signatures)
//! - `CoordinationEffects`: `get`, `list`, `set`, `watch_once`
//! - `FilesystemEffects`, `RetrievalEffects`, `PackageEffects`, `ServiceEffects`
//! - `PhysicalTimeEffects`, `RandomEffects`, `CancellationToken`

#![forbid(unsafe_code)]

/// Runtime configuration
pub mod config;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Reconciliation outcomes
pub mod result;

/// Declarative state model
pub mod state;

pub use config::{LayeredConfig, OtterConfig};
pub use errors::{OtterError, Result};
pub use result::{ResultMap, StateResult};
pub use state::{GraphError, Metadata, StateGraph, StateKind, StateVariant, FAULTED};
