//! Operating system capability handlers
//!
//! `SystemHandler` bundles one backend per capability and is what the
//! listener hands to `StateVariant::consistent` and `StateVariant::apply`.

mod command;
pub mod distro;
pub mod filesystem;
pub mod package;
pub mod retrieval;
pub mod service;

pub use distro::{Distro, DistroFamily, InitSystem};
pub use filesystem::RealFilesystemHandler;
pub use package::DpkgPackageHandler;
pub use retrieval::SourceRetrievalHandler;
pub use service::SystemdServiceHandler;

use async_trait::async_trait;
use otter_core::effects::{
    CapabilityError, FilesystemEffects, PackageEffects, PackageStatus, RetrievalEffects,
    ServiceEffects,
};
use std::path::Path;
use std::sync::Arc;

/// Backend for platforms the detector does not recognise.
#[derive(Debug, Clone)]
pub struct UnsupportedHandler {
    platform: String,
}

impl UnsupportedHandler {
    /// Report `platform` in every failure.
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    fn error(&self) -> CapabilityError {
        CapabilityError::Unsupported {
            reason: self.platform.clone(),
        }
    }
}

#[async_trait]
impl PackageEffects for UnsupportedHandler {
    async fn package_status(&self, _name: &str) -> Result<PackageStatus, CapabilityError> {
        Err(self.error())
    }

    async fn install_package(
        &self,
        _name: &str,
        _version: Option<&str>,
    ) -> Result<(), CapabilityError> {
        Err(self.error())
    }

    async fn remove_package(&self, _name: &str) -> Result<(), CapabilityError> {
        Err(self.error())
    }
}

#[async_trait]
impl ServiceEffects for UnsupportedHandler {
    async fn service_running(&self, _name: &str) -> Result<bool, CapabilityError> {
        Err(self.error())
    }

    async fn start_service(&self, _name: &str) -> Result<(), CapabilityError> {
        Err(self.error())
    }

    async fn stop_service(&self, _name: &str) -> Result<(), CapabilityError> {
        Err(self.error())
    }
}

/// Composite capability handler
#[derive(Clone)]
pub struct SystemHandler {
    filesystem: Arc<dyn FilesystemEffects>,
    retrieval: Arc<dyn RetrievalEffects>,
    packages: Arc<dyn PackageEffects>,
    services: Arc<dyn ServiceEffects>,
}

impl SystemHandler {
    /// Assemble from explicit backends.
    pub fn new(
        filesystem: Arc<dyn FilesystemEffects>,
        retrieval: Arc<dyn RetrievalEffects>,
        packages: Arc<dyn PackageEffects>,
        services: Arc<dyn ServiceEffects>,
    ) -> Self {
        Self {
            filesystem,
            retrieval,
            packages,
            services,
        }
    }

    /// Pick backends for the running host.
    pub fn detect() -> Self {
        let distro = Distro::detect();
        tracing::info!(family = ?distro.family, init = ?distro.init, "detected platform");
        let packages: Arc<dyn PackageEffects> = match distro.family {
            DistroFamily::Debian => Arc::new(DpkgPackageHandler::new()),
            DistroFamily::Other => Arc::new(UnsupportedHandler::new(
                "no package backend for this distribution",
            )),
        };
        let services: Arc<dyn ServiceEffects> = match distro.init {
            InitSystem::Systemd => Arc::new(SystemdServiceHandler::new()),
            InitSystem::Other => Arc::new(UnsupportedHandler::new(
                "no service backend for this init system",
            )),
        };
        Self::new(
            Arc::new(RealFilesystemHandler::new()),
            Arc::new(SourceRetrievalHandler::new()),
            packages,
            services,
        )
    }
}

#[async_trait]
impl FilesystemEffects for SystemHandler {
    async fn exists(&self, path: &Path) -> Result<bool, CapabilityError> {
        self.filesystem.exists(path).await
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool, CapabilityError> {
        self.filesystem.is_symlink(path).await
    }

    async fn remove(&self, path: &Path) -> Result<(), CapabilityError> {
        self.filesystem.remove(path).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), CapabilityError> {
        self.filesystem.symlink(target, link).await
    }

    async fn write_file(
        &self,
        path: &Path,
        data: &[u8],
        mode: u32,
    ) -> Result<(), CapabilityError> {
        self.filesystem.write_file(path, data, mode).await
    }
}

#[async_trait]
impl RetrievalEffects for SystemHandler {
    async fn retrieve(&self, location: &str) -> Result<Vec<u8>, CapabilityError> {
        self.retrieval.retrieve(location).await
    }
}

#[async_trait]
impl PackageEffects for SystemHandler {
    async fn package_status(&self, name: &str) -> Result<PackageStatus, CapabilityError> {
        self.packages.package_status(name).await
    }

    async fn install_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<(), CapabilityError> {
        self.packages.install_package(name, version).await
    }

    async fn remove_package(&self, name: &str) -> Result<(), CapabilityError> {
        self.packages.remove_package(name).await
    }
}

#[async_trait]
impl ServiceEffects for SystemHandler {
    async fn service_running(&self, name: &str) -> Result<bool, CapabilityError> {
        self.services.service_running(name).await
    }

    async fn start_service(&self, name: &str) -> Result<(), CapabilityError> {
        self.services.start_service(name).await
    }

    async fn stop_service(&self, name: &str) -> Result<(), CapabilityError> {
        self.services.stop_service(name).await
    }
}
