//! Service state variant (`running` / `stopped`).

use super::{GraphError, Metadata};
use crate::effects::ServiceEffects;
use crate::result::StateResult;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Declared fields of a service entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// Service manager unit name; defaults to the entry name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Desired running flag; must agree with the desired state when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    /// Names of entries that must be present first
    #[serde(default, deserialize_with = "super::nullable_list")]
    pub require: Vec<String>,
}

/// A validated service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    metadata: Metadata,
    name: String,
    running: bool,
    require: Vec<String>,
}

impl Service {
    /// Validate declared fields against the metadata.
    pub fn from_spec(metadata: Metadata, spec: ServiceSpec) -> Result<Self, GraphError> {
        let invalid = |reason: String| GraphError::InvalidEntry {
            name: metadata.name.clone(),
            reason,
        };
        let running = match metadata.desired_state.as_str() {
            "running" => true,
            "stopped" => false,
            other => return Err(invalid(format!("Invalid service state: {other}"))),
        };
        if let Some(flag) = spec.running {
            if flag != running {
                return Err(invalid(format!(
                    "running: {flag} contradicts service.{}",
                    metadata.desired_state
                )));
            }
        }
        let name = spec.name.unwrap_or_else(|| metadata.name.clone());
        Ok(Self {
            metadata,
            name,
            running,
            require: spec.require,
        })
    }

    /// Declared fields, for serialization.
    pub fn spec(&self) -> ServiceSpec {
        ServiceSpec {
            name: Some(self.name.clone()),
            running: Some(self.running),
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

    /// Unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the service should be running.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Compare the service manager's view against the desired flag.
    pub async fn consistent<E>(&self, effects: &E) -> StateResult
    where
        E: ServiceEffects + ?Sized,
    {
        let md = self.metadata.clone();
        match effects.service_running(&self.name).await {
            Ok(actual) if actual == self.running => StateResult::consistent(md, "Success"),
            Ok(true) => StateResult::inconsistent(md, format!("Service {} is running", self.name)),
            Ok(false) => {
                StateResult::inconsistent(md, format!("Service {} is not running", self.name))
            }
            Err(e) => StateResult::inconsistent(md, e.to_string()),
        }
    }

    /// Start or stop if the check reports drift, then re-check.
    pub async fn apply<E>(&self, effects: &E) -> StateResult
    where
        E: ServiceEffects + ?Sized,
    {
        let check = self.consistent(effects).await;
        if check.consistent {
            return check;
        }
        info!(service = %self.name, running = self.running, "applying service state");
        let outcome = if self.running {
            effects.start_service(&self.name).await
        } else {
            effects.stop_service(&self.name).await
        };
        if let Err(e) = outcome {
            return StateResult::inconsistent(self.metadata.clone(), e.to_string());
        }
        self.consistent(effects).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_flag_follows_desired_state() {
        let svc = Service::from_spec(
            Metadata::new("nginx", "service", "stopped"),
            ServiceSpec::default(),
        )
        .unwrap();
        assert!(!svc.running());
        assert_eq!(svc.name(), "nginx");
    }

    #[test]
    fn contradictory_running_flag_is_rejected() {
        let spec = ServiceSpec {
            running: Some(false),
            ..ServiceSpec::default()
        };
        let err =
            Service::from_spec(Metadata::new("docker", "service", "running"), spec).unwrap_err();
        assert!(matches!(err, GraphError::InvalidEntry { .. }));
    }
}
