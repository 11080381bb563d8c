//! Package state variant (`installed` / `removed`).

use super::{GraphError, Metadata};
use crate::effects::{PackageEffects, PackageStatus};
use crate::result::StateResult;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use tracing::info;

/// Target state of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageState {
    /// Package must be installed (at `version` when declared)
    Installed,
    /// Package must not be installed
    Removed,
}

impl FromStr for PackageState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installed" => Ok(Self::Installed),
            "removed" => Ok(Self::Removed),
            other => Err(format!("Invalid package state: {other}")),
        }
    }
}

/// YAML turns `version: 1.9` into a float; accept any scalar.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Declared fields of a package entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    /// Package manager name; defaults to the entry name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pinned version
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    /// Names of entries that must be present first
    #[serde(default, deserialize_with = "super::nullable_list")]
    pub require: Vec<String>,
}

/// A validated package entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    metadata: Metadata,
    state: PackageState,
    name: String,
    version: Option<String>,
    require: Vec<String>,
}

impl Package {
    /// Validate declared fields against the metadata.
    pub fn from_spec(metadata: Metadata, spec: PackageSpec) -> Result<Self, GraphError> {
        let state = metadata
            .desired_state
            .parse()
            .map_err(|reason| GraphError::InvalidEntry {
                name: metadata.name.clone(),
                reason,
            })?;
        let name = spec.name.unwrap_or_else(|| metadata.name.clone());
        Ok(Self {
            metadata,
            state,
            name,
            version: spec.version,
            require: spec.require,
        })
    }

    /// Declared fields, for serialization.
    pub fn spec(&self) -> PackageSpec {
        PackageSpec {
            name: Some(self.name.clone()),
            version: self.version.clone(),
            require: self.require.clone(),
        }
    }

    /// Entry identity.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Required entry names.
    pub fn requirements(&self) -> &[String] {
        &self.require
    }

    /// Target state.
    pub fn state(&self) -> PackageState {
        self.state
    }

    /// Package manager name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned version.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Compare the package manager's view against the desired state.
    pub async fn consistent<E>(&self, effects: &E) -> StateResult
    where
        E: PackageEffects + ?Sized,
    {
        let md = self.metadata.clone();
        let status = match effects.package_status(&self.name).await {
            Ok(status) => status,
            Err(e) => return StateResult::inconsistent(md, e.to_string()),
        };
        match (self.state, status) {
            (PackageState::Installed, PackageStatus::Installed { version }) => {
                match (&self.version, version) {
                    (Some(wanted), Some(actual)) if !version_matches(wanted, &actual) => {
                        StateResult::inconsistent(
                            md,
                            format!("Package {} is at version {actual}, wanted {wanted}", self.name),
                        )
                    }
                    (Some(wanted), None) => StateResult::inconsistent(
                        md,
                        format!("Package {} has unknown version, wanted {wanted}", self.name),
                    ),
                    _ => StateResult::consistent(md, "Success"),
                }
            }
            (PackageState::Installed, PackageStatus::Removed) => {
                StateResult::inconsistent(md, format!("Package {} is not installed", self.name))
            }
            (PackageState::Removed, PackageStatus::Removed) => {
                StateResult::consistent(md, "Success")
            }
            (PackageState::Removed, PackageStatus::Installed { .. }) => {
                StateResult::inconsistent(md, format!("Package {} is installed", self.name))
            }
        }
    }

    /// Install or remove if the check reports drift, then re-check.
    pub async fn apply<E>(&self, effects: &E) -> StateResult
    where
        E: PackageEffects + ?Sized,
    {
        let check = self.consistent(effects).await;
        if check.consistent {
            return check;
        }
        info!(package = %self.name, state = %self.metadata.desired_state, "applying package state");
        let outcome = match self.state {
            PackageState::Installed => {
                effects
                    .install_package(&self.name, self.version.as_deref())
                    .await
            }
            PackageState::Removed => effects.remove_package(&self.name).await,
        };
        if let Err(e) = outcome {
            return StateResult::inconsistent(self.metadata.clone(), e.to_string());
        }
        self.consistent(effects).await
    }
}

/// A pinned version matches the installed Debian version exactly, or its
/// upstream part once the epoch (`2:`) and revision (`-0~jessie`) are dropped.
fn version_matches(wanted: &str, actual: &str) -> bool {
    if wanted == actual {
        return true;
    }
    let without_epoch = if wanted.contains(':') {
        actual
    } else {
        actual.split_once(':').map_or(actual, |(_, rest)| rest)
    };
    if wanted == without_epoch {
        return true;
    }
    if wanted.contains('-') {
        return false;
    }
    without_epoch
        .rsplit_once('-')
        .is_some_and(|(upstream, _)| upstream == wanted)
}
