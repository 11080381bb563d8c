//! Declarative state model: entries, variants, and the validated graph.

pub mod file;
pub mod graph;
pub mod loader;
pub mod metadata;
pub mod package;
pub mod service;
pub mod variant;

pub use file::{File, FileMode, FileSpec, FileState};
pub use graph::{GraphError, StateGraph};
pub use loader::{load_from_path, load_from_str};
pub use metadata::{Metadata, StateKind, FAULTED};
pub use package::{Package, PackageSpec, PackageState};
pub use service::{Service, ServiceSpec};
pub use variant::StateVariant;

/// `require: null` appears in processed payloads; treat it as empty.
pub(crate) fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
