//! Operating-system capability traits consumed by state variants.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `otter-effects` (tokio fs, dpkg/apt, systemd, http)
//! - **Usage**: `StateVariant::consistent` and `StateVariant::apply`
//!
//! The core never touches the OS directly; drift detection and reconciliation
//! are expressed against these narrow capabilities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Failure of an OS capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CapabilityError {
    /// No retrieval backend understands the source scheme.
    #[error("Unable to parse source type: {location}")]
    UnsupportedSource {
        /// Declared source
        location: String,
    },
    /// Fetching remote content failed.
    #[error("Retrieval of {location} failed: {reason}")]
    Retrieval {
        /// Declared source
        location: String,
        /// Failure description
        reason: String,
    },
    /// Package query or mutation failed.
    #[error("Package {name}: {reason}")]
    Package {
        /// Package name
        name: String,
        /// Failure description
        reason: String,
    },
    /// Service query or mutation failed.
    #[error("Service {name}: {reason}")]
    Service {
        /// Service name
        name: String,
        /// Failure description
        reason: String,
    },
    /// Filesystem operation failed.
    #[error("{path}: {reason}")]
    Filesystem {
        /// Affected path
        path: String,
        /// Failure description
        reason: String,
    },
    /// The host platform has no backend for this capability.
    #[error("Unsupported platform: {reason}")]
    Unsupported {
        /// Failure description
        reason: String,
    },
}

impl CapabilityError {
    /// Create a filesystem error for `path`
    pub fn filesystem(path: &Path, reason: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a package error
    pub fn package(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Package {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a service error
    pub fn service(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Service {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Installation status reported by the package manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    /// Installed, with the version when the manager reports one
    Installed {
        /// Installed version
        version: Option<String>,
    },
    /// Not installed
    Removed,
}

impl PackageStatus {
    /// True for any installed version.
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}

/// Local filesystem inspection and mutation.
#[async_trait]
pub trait FilesystemEffects: Send + Sync {
    /// True if anything (including a dangling link) exists at `path`.
    async fn exists(&self, path: &Path) -> Result<bool, CapabilityError>;

    /// True if `path` itself is a symbolic link.
    async fn is_symlink(&self, path: &Path) -> Result<bool, CapabilityError>;

    /// Delete the file or link at `path`.
    async fn remove(&self, path: &Path) -> Result<(), CapabilityError>;

    /// Create `link` pointing at `target`.
    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), CapabilityError>;

    /// Write `data` to `path` and set its permission bits.
    async fn write_file(&self, path: &Path, data: &[u8], mode: u32)
        -> Result<(), CapabilityError>;
}

/// Fetches file content by source location (`http://`, `file://`, ...).
#[async_trait]
pub trait RetrievalEffects: Send + Sync {
    /// Retrieve the full content at `location`.
    async fn retrieve(&self, location: &str) -> Result<Vec<u8>, CapabilityError>;
}

/// Package manager capability.
#[async_trait]
pub trait PackageEffects: Send + Sync {
    /// Query installation status.
    async fn package_status(&self, name: &str) -> Result<PackageStatus, CapabilityError>;

    /// Install a package, pinning `version` when given.
    async fn install_package(&self, name: &str, version: Option<&str>)
        -> Result<(), CapabilityError>;

    /// Remove a package.
    async fn remove_package(&self, name: &str) -> Result<(), CapabilityError>;
}

/// Service manager capability.
#[async_trait]
pub trait ServiceEffects: Send + Sync {
    /// True if the service is currently running.
    async fn service_running(&self, name: &str) -> Result<bool, CapabilityError>;

    /// Start the service and wait for the manager to report completion.
    async fn start_service(&self, name: &str) -> Result<(), CapabilityError>;

    /// Stop the service and wait for the manager to report completion.
    async fn stop_service(&self, name: &str) -> Result<(), CapabilityError>;
}

/// Everything a state variant may need to reconcile itself.
pub trait ReconcileEffects:
    FilesystemEffects + RetrievalEffects + PackageEffects + ServiceEffects
{
}

impl<T> ReconcileEffects for T where
    T: FilesystemEffects + RetrievalEffects + PackageEffects + ServiceEffects + ?Sized
{
}

#[async_trait]
impl<T: FilesystemEffects + ?Sized> FilesystemEffects for Arc<T> {
    async fn exists(&self, path: &Path) -> Result<bool, CapabilityError> {
        (**self).exists(path).await
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool, CapabilityError> {
        (**self).is_symlink(path).await
    }

    async fn remove(&self, path: &Path) -> Result<(), CapabilityError> {
        (**self).remove(path).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), CapabilityError> {
        (**self).symlink(target, link).await
    }

    async fn write_file(
        &self,
        path: &Path,
        data: &[u8],
        mode: u32,
    ) -> Result<(), CapabilityError> {
        (**self).write_file(path, data, mode).await
    }
}

#[async_trait]
impl<T: RetrievalEffects + ?Sized> RetrievalEffects for Arc<T> {
    async fn retrieve(&self, location: &str) -> Result<Vec<u8>, CapabilityError> {
        (**self).retrieve(location).await
    }
}

#[async_trait]
impl<T: PackageEffects + ?Sized> PackageEffects for Arc<T> {
    async fn package_status(&self, name: &str) -> Result<PackageStatus, CapabilityError> {
        (**self).package_status(name).await
    }

    async fn install_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<(), CapabilityError> {
        (**self).install_package(name, version).await
    }

    async fn remove_package(&self, name: &str) -> Result<(), CapabilityError> {
        (**self).remove_package(name).await
    }
}

#[async_trait]
impl<T: ServiceEffects + ?Sized> ServiceEffects for Arc<T> {
    async fn service_running(&self, name: &str) -> Result<bool, CapabilityError> {
        (**self).service_running(name).await
    }

    async fn start_service(&self, name: &str) -> Result<(), CapabilityError> {
        (**self).start_service(name).await
    }

    async fn stop_service(&self, name: &str) -> Result<(), CapabilityError> {
        (**self).stop_service(name).await
    }
}
