//! Local filesystem handler backed by `tokio::fs`.

use async_trait::async_trait;
use otter_core::effects::{CapabilityError, FilesystemEffects};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Real filesystem handler
#[derive(Debug, Clone, Default)]
pub struct RealFilesystemHandler;

impl RealFilesystemHandler {
    /// Create a new filesystem handler
    pub fn new() -> Self {
        Self
    }
}

fn fs_error(path: &Path, err: std::io::Error) -> CapabilityError {
    CapabilityError::filesystem(path, err.to_string())
}

#[async_trait]
impl FilesystemEffects for RealFilesystemHandler {
    async fn exists(&self, path: &Path) -> Result<bool, CapabilityError> {
        match fs::symlink_metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fs_error(path, e)),
        }
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool, CapabilityError> {
        match fs::symlink_metadata(path).await {
            Ok(meta) => Ok(meta.file_type().is_symlink()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fs_error(path, e)),
        }
    }

    async fn remove(&self, path: &Path) -> Result<(), CapabilityError> {
        let meta = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(fs_error(path, e)),
        };
        debug!(path = %path.display(), "removing");
        let removed = if meta.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        removed.map_err(|e| fs_error(path, e))
    }

    #[cfg(unix)]
    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), CapabilityError> {
        if self.exists(link).await? {
            self.remove(link).await?;
        }
        if let Some(parent) = link.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| fs_error(parent, e))?;
        }
        fs::symlink(target, link).await.map_err(|e| fs_error(link, e))
    }

    #[cfg(not(unix))]
    async fn symlink(&self, _target: &Path, link: &Path) -> Result<(), CapabilityError> {
        Err(CapabilityError::filesystem(
            link,
            "symbolic links are not supported on this platform",
        ))
    }

    async fn write_file(
        &self,
        path: &Path,
        data: &[u8],
        mode: u32,
    ) -> Result<(), CapabilityError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| fs_error(parent, e))?;
        }
        fs::write(path, data).await.map_err(|e| fs_error(path, e))?;
        set_mode(path, mode).await
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), CapabilityError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| fs_error(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), CapabilityError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/motd");
        let fs = RealFilesystemHandler::new();

        assert!(!fs.exists(&path).await.unwrap());
        fs.write_file(&path, b"hello", 0o600).await.unwrap();
        assert!(fs.exists(&path).await.unwrap());
        assert!(!fs.is_symlink(&path).await.unwrap());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        fs.remove(&path).await.unwrap();
        assert!(!fs.exists(&path).await.unwrap());
        // removing twice is fine
        fs.remove(&path).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_links_exist() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        let fs = RealFilesystemHandler::new();

        fs.symlink(&dir.path().join("missing"), &link).await.unwrap();
        assert!(fs.exists(&link).await.unwrap());
        assert!(fs.is_symlink(&link).await.unwrap());

        // relinking replaces the old link
        fs.symlink(dir.path(), &link).await.unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), dir.path());
    }
}
