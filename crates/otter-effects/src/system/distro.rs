//! Host platform detection from `/etc/os-release`.

use std::path::Path;

/// Distribution family, which selects the package backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    /// Debian, Ubuntu and derivatives (dpkg/apt)
    Debian,
    /// Anything without a package backend
    Other,
}

/// Init system, which selects the service backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    /// systemd (`systemctl`)
    Systemd,
    /// Anything without a service backend
    Other,
}

/// Detected platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distro {
    /// Distribution family
    pub family: DistroFamily,
    /// Init system
    pub init: InitSystem,
}

impl Distro {
    /// Inspect the running host.
    pub fn detect() -> Self {
        let release = std::fs::read_to_string("/etc/os-release").unwrap_or_default();
        let init = if Path::new("/run/systemd/system").exists() {
            InitSystem::Systemd
        } else {
            InitSystem::Other
        };
        Self {
            family: family_from_os_release(&release),
            init,
        }
    }
}

/// Classify an `os-release` document by its `ID` and `ID_LIKE` fields.
pub fn family_from_os_release(release: &str) -> DistroFamily {
    let debian_like = release
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| matches!(key.trim(), "ID" | "ID_LIKE"))
        .flat_map(|(_, value)| {
            value
                .trim()
                .trim_matches('"')
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .any(|id| id == "debian" || id == "ubuntu");
    if debian_like {
        DistroFamily::Debian
    } else {
        DistroFamily::Other
    }
}
