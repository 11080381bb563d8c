//! Closed set of reconcilable entities.
//!
//! Wire form of one entry (an element of `/state/<hostname>`):
//!
//! ```json
//! { "metadata": { "name": "docker", "kind": "package", "desiredState": "installed" },
//!   "name": "docker-engine", "version": "1.9.1", "require": ["/etc/default/docker"] }
//! ```

use super::file::{File, FileSpec};
use super::package::{Package, PackageSpec};
use super::service::{Service, ServiceSpec};
use super::{GraphError, Metadata, StateKind};
use crate::effects::ReconcileEffects;
use crate::result::StateResult;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One declared state entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateVariant {
    /// File on disk
    File(File),
    /// OS package
    Package(Package),
    /// Managed service
    Service(Service),
}

impl StateVariant {
    /// Build a variant from its metadata and declared fields.
    ///
    /// `fields` may be `null` for sections that declare nothing.
    pub fn from_section(metadata: Metadata, fields: serde_json::Value) -> Result<Self, GraphError> {
        let fields = match fields {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other,
        };
        let invalid = |err: serde_json::Error| GraphError::InvalidEntry {
            name: metadata.name.clone(),
            reason: err.to_string(),
        };
        tracing::debug!(entry = %metadata, "loading state entry");
        match metadata.state_kind()? {
            StateKind::File => {
                let spec: FileSpec = serde_json::from_value(fields).map_err(invalid)?;
                File::from_spec(metadata, spec).map(Self::File)
            }
            StateKind::Package => {
                let spec: PackageSpec = serde_json::from_value(fields).map_err(invalid)?;
                Package::from_spec(metadata, spec).map(Self::Package)
            }
            StateKind::Service => {
                let spec: ServiceSpec = serde_json::from_value(fields).map_err(invalid)?;
                Service::from_spec(metadata, spec).map(Self::Service)
            }
        }
    }

    /// Entry identity.
    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::File(f) => f.metadata(),
            Self::Package(p) => p.metadata(),
            Self::Service(s) => s.metadata(),
        }
    }

    /// Names this entry requires.
    pub fn requirements(&self) -> &[String] {
        match self {
            Self::File(f) => f.requirements(),
            Self::Package(p) => p.requirements(),
            Self::Service(s) => s.requirements(),
        }
    }

    /// Variant kind.
    pub fn kind(&self) -> StateKind {
        match self {
            Self::File(_) => StateKind::File,
            Self::Package(_) => StateKind::Package,
            Self::Service(_) => StateKind::Service,
        }
    }

    /// Read-only drift check.
    pub async fn consistent<E>(&self, effects: &E) -> StateResult
    where
        E: ReconcileEffects + ?Sized,
    {
        match self {
            Self::File(f) => f.consistent(effects).await,
            Self::Package(p) => p.consistent(effects).await,
            Self::Service(s) => s.consistent(effects).await,
        }
    }

    /// Reconcile drift, then report the re-checked state.
    pub async fn apply<E>(&self, effects: &E) -> StateResult
    where
        E: ReconcileEffects + ?Sized,
    {
        match self {
            Self::File(f) => f.apply(effects).await,
            Self::Package(p) => p.apply(effects).await,
            Self::Service(s) => s.apply(effects).await,
        }
    }
}

#[derive(Serialize)]
struct WireEntry<'a, S: Serialize> {
    metadata: &'a Metadata,
    #[serde(flatten)]
    spec: S,
}

#[derive(Deserialize)]
struct RawEntry {
    metadata: Metadata,
    #[serde(flatten)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Serialize for StateVariant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let metadata = self.metadata();
        match self {
            Self::File(f) => WireEntry { metadata, spec: f.spec() }.serialize(serializer),
            Self::Package(p) => WireEntry { metadata, spec: p.spec() }.serialize(serializer),
            Self::Service(s) => WireEntry { metadata, spec: s.spec() }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StateVariant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEntry::deserialize(deserializer)?;
        Self::from_section(raw.metadata, serde_json::Value::Object(raw.fields))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kind_is_rejected() {
        let err = StateVariant::from_section(Metadata::new("x", "cron", "present"), json!({}))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownKind {
                kind: "cron".to_string()
            }
        );
    }

    #[test]
    fn null_section_uses_defaults() {
        let svc = StateVariant::from_section(Metadata::new("docker", "service", "running"), json!(null))
            .unwrap();
        assert_eq!(svc.kind(), StateKind::Service);
        assert!(svc.requirements().is_empty());
    }

    #[test]
    fn wire_form_roundtrips() {
        let pkg = StateVariant::from_section(
            Metadata::new("docker", "package", "installed"),
            json!({"version": "1.9.1", "require": ["/etc/default/docker"]}),
        )
        .unwrap();
        let wire = serde_json::to_value(&pkg).unwrap();
        assert_eq!(wire["metadata"]["desiredState"], "installed");
        assert_eq!(wire["version"], "1.9.1");
        let back: StateVariant = serde_json::from_value(wire).unwrap();
        assert_eq!(back, pkg);
    }
}
