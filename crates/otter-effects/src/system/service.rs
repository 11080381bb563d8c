//! systemd service backend driven through `systemctl`.

use super::command::run;
use async_trait::async_trait;
use otter_core::effects::{CapabilityError, ServiceEffects};
use tracing::info;

/// Service handler for systemd hosts
#[derive(Debug, Clone, Default)]
pub struct SystemdServiceHandler;

impl SystemdServiceHandler {
    /// Create a new systemd handler
    pub fn new() -> Self {
        Self
    }

    fn unit(name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else {
            format!("{name}.service")
        }
    }

    async fn systemctl(&self, name: &str, verb: &str) -> Result<(), CapabilityError> {
        let unit = Self::unit(name);
        let output = run("systemctl", &[verb, &unit], &[])
            .await
            .map_err(|e| CapabilityError::service(name, e))?;
        if output.success {
            info!(unit = %unit, "systemctl {verb}");
            Ok(())
        } else {
            Err(CapabilityError::service(
                name,
                format!("systemctl {verb} failed: {}", output.diagnostic()),
            ))
        }
    }
}

#[async_trait]
impl ServiceEffects for SystemdServiceHandler {
    async fn service_running(&self, name: &str) -> Result<bool, CapabilityError> {
        let output = run("systemctl", &["is-active", &Self::unit(name)], &[])
            .await
            .map_err(|e| CapabilityError::service(name, e))?;
        // is-active exits non-zero for inactive, failed and unknown units
        Ok(output.stdout.trim() == "active")
    }

    async fn start_service(&self, name: &str) -> Result<(), CapabilityError> {
        self.systemctl(name, "start").await
    }

    async fn stop_service(&self, name: &str) -> Result<(), CapabilityError> {
        self.systemctl(name, "stop").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_become_service_units() {
        assert_eq!(SystemdServiceHandler::unit("docker"), "docker.service");
        assert_eq!(SystemdServiceHandler::unit("docker.socket"), "docker.socket");
    }
}
