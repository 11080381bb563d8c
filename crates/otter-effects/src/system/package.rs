//! Debian package backend: `dpkg-query` for status, `apt-get` for changes.

use super::command::run;
use async_trait::async_trait;
use otter_core::effects::{CapabilityError, PackageEffects, PackageStatus};
use tracing::info;

const APT_ENV: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

/// Package handler for dpkg/apt based distributions
#[derive(Debug, Clone, Default)]
pub struct DpkgPackageHandler;

impl DpkgPackageHandler {
    /// Create a new dpkg handler
    pub fn new() -> Self {
        Self
    }

    async fn apt(&self, name: &str, args: &[&str]) -> Result<(), CapabilityError> {
        let output = run("apt-get", args, APT_ENV)
            .await
            .map_err(|e| CapabilityError::package(name, e))?;
        if output.success {
            info!(package = name, "apt-get {}", args.join(" "));
            Ok(())
        } else {
            Err(CapabilityError::package(name, output.diagnostic()))
        }
    }
}

/// Parse `dpkg-query -W -f='${Status}\t${Version}'` output.
///
/// `Status` is `<want> <flag> <state>`; only `installed` counts as installed,
/// and leftovers such as `config-files` count as removed.
pub(crate) fn parse_dpkg_status(name: &str, output: &str) -> Result<PackageStatus, CapabilityError> {
    let line = output.lines().next().unwrap_or_default();
    let (status, version) = line.split_once('\t').unwrap_or((line, ""));
    let state = status.split_whitespace().nth(2).unwrap_or_default();
    match state {
        "installed" => Ok(PackageStatus::Installed {
            version: Some(version.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }),
        "not-installed" | "config-files" | "" => Ok(PackageStatus::Removed),
        other => Err(CapabilityError::package(
            name,
            format!("Package {name} is in an unknown state: {other}"),
        )),
    }
}

#[async_trait]
impl PackageEffects for DpkgPackageHandler {
    async fn package_status(&self, name: &str) -> Result<PackageStatus, CapabilityError> {
        let output = run(
            "dpkg-query",
            &["-W", "-f=${Status}\t${Version}", name],
            &[],
        )
        .await
        .map_err(|e| CapabilityError::package(name, e))?;
        if !output.success {
            // dpkg-query exits non-zero for packages it has never seen
            return Ok(PackageStatus::Removed);
        }
        parse_dpkg_status(name, &output.stdout)
    }

    async fn install_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<(), CapabilityError> {
        self.apt(name, &["update"]).await?;
        let target = match version {
            Some(version) => format!("{name}={version}"),
            None => name.to_string(),
        };
        self.apt(name, &["install", "-y", &target]).await
    }

    async fn remove_package(&self, name: &str) -> Result<(), CapabilityError> {
        self.apt(name, &["remove", "-y", name]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_status_carries_version() {
        let status = parse_dpkg_status("docker", "install ok installed\t1.9.1-0~jessie").unwrap();
        assert_eq!(
            status,
            PackageStatus::Installed {
                version: Some("1.9.1-0~jessie".to_string())
            }
        );
    }

    #[test]
    fn leftover_config_counts_as_removed() {
        let status = parse_dpkg_status("docker", "deinstall ok config-files\t1.9.1").unwrap();
        assert_eq!(status, PackageStatus::Removed);
    }

    #[test]
    fn half_installed_is_an_error() {
        let err = parse_dpkg_status("docker", "install reinstreq half-installed\t1.0").unwrap_err();
        assert!(err.to_string().contains("half-installed"));
    }
}
