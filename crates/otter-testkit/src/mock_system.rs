//! In-memory OS capabilities
//!
//! `MockSystem` implements every capability a state variant reconciles
//! against: a virtual filesystem, a table of retrievable sources, a package
//! database and a service table. Mutations are journalled so tests can
//! assert on what an apply actually did.
//!
//! # Blocking Lock Usage
//!
//! Uses `std::sync::Mutex`; no lock is held across an await point.

#![allow(clippy::disallowed_types)]

use async_trait::async_trait;
use otter_core::effects::{
    CapabilityError, FilesystemEffects, PackageEffects, PackageStatus, RetrievalEffects,
    ServiceEffects,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A node in the virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFile {
    /// Regular file
    Regular {
        /// Contents
        data: Vec<u8>,
        /// Permission bits
        mode: u32,
    },
    /// Symbolic link
    Link {
        /// Link target
        target: PathBuf,
    },
}

#[derive(Debug, Default)]
struct MockSystemState {
    files: BTreeMap<PathBuf, MockFile>,
    sources: HashMap<String, Vec<u8>>,
    packages: HashMap<String, Option<String>>,
    services: HashMap<String, bool>,
    broken_packages: HashSet<String>,
    broken_services: HashSet<String>,
    calls: Vec<String>,
}

/// Mock OS capabilities for deterministic testing
#[derive(Debug, Clone, Default)]
pub struct MockSystem {
    state: Arc<Mutex<MockSystemState>>,
}

impl MockSystem {
    /// Empty system: no files, packages or running services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regular file.
    pub fn with_file(self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        self.state.lock().unwrap().files.insert(
            path.into(),
            MockFile::Regular {
                data: data.into(),
                mode: 0o644,
            },
        );
        self
    }

    /// Add a symbolic link.
    pub fn with_symlink(self, link: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        self.state.lock().unwrap().files.insert(
            link.into(),
            MockFile::Link {
                target: target.into(),
            },
        );
        self
    }

    /// Make `location` retrievable.
    pub fn with_source(self, location: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .sources
            .insert(location.into(), data.into());
        self
    }

    /// Mark a package installed.
    pub fn with_package(self, name: impl Into<String>, version: Option<&str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .packages
            .insert(name.into(), version.map(str::to_string));
        self
    }

    /// Set a service's running flag.
    pub fn with_service(self, name: impl Into<String>, running: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .services
            .insert(name.into(), running);
        self
    }

    /// Make installs and removals of `name` fail.
    pub fn with_broken_package(self, name: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .broken_packages
            .insert(name.into());
        self
    }

    /// Make starts and stops of `name` fail.
    pub fn with_broken_service(self, name: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .broken_services
            .insert(name.into());
        self
    }

    /// Node at `path`, if any.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<MockFile> {
        self.state.lock().unwrap().files.get(path.as_ref()).cloned()
    }

    /// Installed version of `name`; `None` when not installed.
    pub fn package(&self, name: &str) -> Option<Option<String>> {
        self.state.lock().unwrap().packages.get(name).cloned()
    }

    /// Running flag of `name`.
    pub fn service(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .services
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    /// Mutations performed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(state: &mut MockSystemState, call: String) {
        tracing::trace!(call = %call, "mock system call");
        state.calls.push(call);
    }
}

#[async_trait]
impl FilesystemEffects for MockSystem {
    async fn exists(&self, path: &Path) -> Result<bool, CapabilityError> {
        Ok(self.state.lock().unwrap().files.contains_key(path))
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool, CapabilityError> {
        Ok(matches!(
            self.state.lock().unwrap().files.get(path),
            Some(MockFile::Link { .. })
        ))
    }

    async fn remove(&self, path: &Path) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        state.files.remove(path);
        Self::record(&mut state, format!("remove {}", path.display()));
        Ok(())
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            link.to_path_buf(),
            MockFile::Link {
                target: target.to_path_buf(),
            },
        );
        Self::record(
            &mut state,
            format!("symlink {} -> {}", link.display(), target.display()),
        );
        Ok(())
    }

    async fn write_file(
        &self,
        path: &Path,
        data: &[u8],
        mode: u32,
    ) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            path.to_path_buf(),
            MockFile::Regular {
                data: data.to_vec(),
                mode,
            },
        );
        Self::record(&mut state, format!("write {} {mode:o}", path.display()));
        Ok(())
    }
}

#[async_trait]
impl RetrievalEffects for MockSystem {
    async fn retrieve(&self, location: &str) -> Result<Vec<u8>, CapabilityError> {
        self.state
            .lock()
            .unwrap()
            .sources
            .get(location)
            .cloned()
            .ok_or_else(|| CapabilityError::Retrieval {
                location: location.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

#[async_trait]
impl PackageEffects for MockSystem {
    async fn package_status(&self, name: &str) -> Result<PackageStatus, CapabilityError> {
        Ok(match self.state.lock().unwrap().packages.get(name) {
            Some(version) => PackageStatus::Installed {
                version: version.clone(),
            },
            None => PackageStatus::Removed,
        })
    }

    async fn install_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("install {name}"));
        if state.broken_packages.contains(name) {
            return Err(CapabilityError::package(name, "E: Unable to locate package"));
        }
        let installed = version.map(str::to_string).or_else(|| Some("1.0".to_string()));
        state.packages.insert(name.to_string(), installed);
        Ok(())
    }

    async fn remove_package(&self, name: &str) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("remove-package {name}"));
        if state.broken_packages.contains(name) {
            return Err(CapabilityError::package(name, "dpkg was interrupted"));
        }
        state.packages.remove(name);
        Ok(())
    }
}

#[async_trait]
impl ServiceEffects for MockSystem {
    async fn service_running(&self, name: &str) -> Result<bool, CapabilityError> {
        Ok(self.service(name))
    }

    async fn start_service(&self, name: &str) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("start {name}"));
        if state.broken_services.contains(name) {
            return Err(CapabilityError::service(name, "job failed"));
        }
        state.services.insert(name.to_string(), true);
        Ok(())
    }

    async fn stop_service(&self, name: &str) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("stop {name}"));
        if state.broken_services.contains(name) {
            return Err(CapabilityError::service(name, "job failed"));
        }
        state.services.insert(name.to_string(), false);
        Ok(())
    }
}
