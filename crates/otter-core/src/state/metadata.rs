//! State entry identity.

use super::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name, kind and desired state used for results that stand in for a failure.
pub const FAULTED: &str = "Faulted";

/// `(name, kind, desiredState)` triple identifying one declared state entry.
///
/// Kept as plain strings so that synthetic entries such as the `Faulted`
/// result marker round-trip through the wire format unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Unique name of the entry
    pub name: String,
    /// Variant selector: `file`, `package` or `service`
    pub kind: String,
    /// Variant-specific target state
    pub desired_state: String,
}

impl Metadata {
    /// Build a metadata triple.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        desired_state: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            desired_state: desired_state.into(),
        }
    }

    /// Marker metadata for results synthesised from an error.
    pub fn faulted() -> Self {
        Self::new(FAULTED, FAULTED, FAULTED)
    }

    /// True for the `Faulted` marker.
    pub fn is_faulted(&self) -> bool {
        self.kind == FAULTED
    }

    /// Parse a declarative section key of the form `<kind>.<desiredState>`.
    pub fn from_section(name: &str, section: &str) -> Result<Self, GraphError> {
        match section.split_once('.') {
            Some((kind, state)) if !kind.is_empty() && !state.is_empty() && !state.contains('.') => {
                Ok(Self::new(name, kind, state))
            }
            _ => Err(GraphError::InvalidEntry {
                name: name.to_string(),
                reason: format!("section '{section}' is not of the form <kind>.<state>"),
            }),
        }
    }

    /// The `<kind>.<desiredState>` section key for this entry.
    pub fn section(&self) -> String {
        format!("{}.{}", self.kind, self.desired_state)
    }

    /// Parsed variant kind.
    pub fn state_kind(&self) -> Result<StateKind, GraphError> {
        self.kind.parse()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}.{})", self.name, self.kind, self.desired_state)
    }
}

/// Closed set of state variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// A file on disk
    File,
    /// An OS package
    Package,
    /// A managed service
    Service,
}

impl StateKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Package => "package",
            Self::Service => "service",
        }
    }
}

impl FromStr for StateKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "package" => Ok(Self::Package),
            "service" => Ok(Self::Service),
            other => Err(GraphError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_key_parses_kind_and_state() {
        let md = Metadata::from_section("docker", "package.installed").unwrap();
        assert_eq!(md, Metadata::new("docker", "package", "installed"));
        assert_eq!(md.section(), "package.installed");
        assert_eq!(md.state_kind().unwrap(), StateKind::Package);
    }

    #[test]
    fn malformed_section_keys_are_rejected() {
        for bad in ["package", ".installed", "package.", "a.b.c"] {
            assert!(
                matches!(
                    Metadata::from_section("x", bad),
                    Err(GraphError::InvalidEntry { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn metadata_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(Metadata::new("a", "file", "absent")).unwrap();
        assert_eq!(json["desiredState"], "absent");
        assert_eq!(json["kind"], "file");
    }

    #[test]
    fn faulted_marker_is_recognised() {
        assert!(Metadata::faulted().is_faulted());
        assert!(!Metadata::new("a", "file", "absent").is_faulted());
    }
}
