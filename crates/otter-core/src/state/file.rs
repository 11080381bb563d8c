//! File state variant.
//!
//! Desired states:
//! - `absent`: nothing exists at the path
//! - `linked`: the path is a symbolic link to `source`
//! - `rendered`: the path exists; content fetched from `source` on apply
//!
//! A rendered file is considered consistent as soon as it exists. Content is
//! not compared against the source.

use super::{GraphError, Metadata};
use crate::effects::{FilesystemEffects, RetrievalEffects};
use crate::result::StateResult;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Target state of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Path must not exist
    Absent,
    /// Path must be a symbolic link
    Linked,
    /// Path must exist
    Rendered,
}

impl FromStr for FileState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absent" => Ok(Self::Absent),
            "linked" => Ok(Self::Linked),
            "rendered" => Ok(Self::Rendered),
            other => Err(format!("invalid file state: {other}")),
        }
    }
}

/// Unix permission bits, written in octal on the wire (`"644"`).
///
/// Accepts either a string or an integer whose decimal digits are read as
/// octal, since YAML `mode: 644` arrives as the integer 644.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(pub u32);

impl FileMode {
    /// Parse octal digits.
    pub fn parse(digits: &str) -> Result<Self, String> {
        let trimmed = digits.trim().trim_start_matches("0o");
        u32::from_str_radix(trimmed, 8)
            .ok()
            .filter(|bits| *bits <= 0o7777)
            .map(FileMode)
            .ok_or_else(|| format!("invalid file mode: {digits}"))
    }

    /// Raw permission bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self(0o644)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

impl Serialize for FileMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ModeVisitor;

        impl<'de> Visitor<'de> for ModeVisitor {
            type Value = FileMode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an octal file mode as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FileMode, E> {
                FileMode::parse(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FileMode, E> {
                FileMode::parse(&v.to_string()).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FileMode, E> {
                FileMode::parse(&v.to_string()).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ModeVisitor)
    }
}

/// Declared fields of a file entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    /// Destination path; defaults to the entry name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Permission bits for rendered files
    #[serde(default)]
    pub mode: FileMode,
    /// Content source (rendered) or link target (linked)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Names of entries that must be present first
    #[serde(default, deserialize_with = "super::nullable_list")]
    pub require: Vec<String>,
}

/// A validated file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    metadata: Metadata,
    state: FileState,
    path: PathBuf,
    mode: FileMode,
    source: Option<String>,
    require: Vec<String>,
}

impl File {
    /// Validate declared fields against the metadata.
    pub fn from_spec(metadata: Metadata, spec: FileSpec) -> Result<Self, GraphError> {
        let invalid = |reason: String| GraphError::InvalidEntry {
            name: metadata.name.clone(),
            reason,
        };
        let state: FileState = metadata.desired_state.parse().map_err(invalid)?;
        if matches!(state, FileState::Linked | FileState::Rendered) && spec.source.is_none() {
            return Err(invalid(format!(
                "file.{} requires a source",
                metadata.desired_state
            )));
        }
        let path = PathBuf::from(spec.path.unwrap_or_else(|| metadata.name.clone()));
        Ok(Self {
            metadata,
            state,
            path,
            mode: spec.mode,
            source: spec.source,
            require: spec.require,
        })
    }

    /// Declared fields, for serialization.
    pub fn spec(&self) -> FileSpec {
        FileSpec {
            path: Some(self.path.display().to_string()),
            mode: self.mode,
            source: self.source.clone(),
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
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Permission bits.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Declared source.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Compare the filesystem against the desired state.
    pub async fn consistent<E>(&self, effects: &E) -> StateResult
    where
        E: FilesystemEffects + ?Sized,
    {
        let md = self.metadata.clone();
        let path = self.path.display();
        match self.state {
            FileState::Absent => match effects.exists(&self.path).await {
                Ok(false) => StateResult::consistent(md, "Success"),
                Ok(true) => StateResult::inconsistent(md, format!("File: {path} exists")),
                Err(e) => StateResult::inconsistent(md, e.to_string()),
            },
            FileState::Linked => match effects.is_symlink(&self.path).await {
                Ok(true) => StateResult::consistent(md, "Success"),
                Ok(false) => {
                    StateResult::inconsistent(md, format!("File {path} is not a symlink"))
                }
                Err(e) => StateResult::inconsistent(md, e.to_string()),
            },
            FileState::Rendered => match effects.exists(&self.path).await {
                Ok(true) => StateResult::consistent(md, "Success"),
                Ok(false) => StateResult::inconsistent(md, format!("File {path} does not exist")),
                Err(e) => StateResult::inconsistent(md, e.to_string()),
            },
        }
    }

    /// Reconcile the filesystem if the check reports drift, then re-check.
    pub async fn apply<E>(&self, effects: &E) -> StateResult
    where
        E: FilesystemEffects + RetrievalEffects + ?Sized,
    {
        let check = self.consistent(effects).await;
        if check.consistent {
            debug!(path = %self.path.display(), "file already consistent");
            return check;
        }
        info!(
            path = %self.path.display(),
            state = %self.metadata.desired_state,
            "applying file state"
        );
        if let Err(message) = self.reconcile(effects).await {
            return StateResult::inconsistent(self.metadata.clone(), message);
        }
        self.consistent(effects).await
    }

    async fn reconcile<E>(&self, effects: &E) -> Result<(), String>
    where
        E: FilesystemEffects + RetrievalEffects + ?Sized,
    {
        match self.state {
            FileState::Absent => effects.remove(&self.path).await.map_err(|e| e.to_string()),
            FileState::Linked => {
                let target = self.source.as_deref().unwrap_or_default();
                effects
                    .symlink(Path::new(target), &self.path)
                    .await
                    .map_err(|e| e.to_string())
            }
            FileState::Rendered => {
                let source = self.source.as_deref().unwrap_or_default();
                let data = effects.retrieve(source).await.map_err(|e| e.to_string())?;
                info!(path = %self.path.display(), mode = %self.mode, bytes = data.len(), "writing file");
                effects
                    .write_file(&self.path, &data, self.mode.bits())
                    .await
                    .map_err(|e| e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_accepts_yaml_integer_as_octal() {
        let mode: FileMode = serde_json::from_value(serde_json::json!(644)).unwrap();
        assert_eq!(mode.bits(), 0o644);
        let mode: FileMode = serde_json::from_value(serde_json::json!("0755")).unwrap();
        assert_eq!(mode.bits(), 0o755);
        assert_eq!(serde_json::to_value(mode).unwrap(), "755");
    }

    #[test]
    fn mode_rejects_non_octal_digits() {
        assert!(serde_json::from_value::<FileMode>(serde_json::json!(999)).is_err());
        assert!(serde_json::from_value::<FileMode>(serde_json::json!("rw-")).is_err());
    }

    #[test]
    fn path_defaults_to_entry_name() {
        let file = File::from_spec(
            Metadata::new("/tmp/otter-absent", "file", "absent"),
            FileSpec::default(),
        )
        .unwrap();
        assert_eq!(file.path(), Path::new("/tmp/otter-absent"));
    }

    #[test]
    fn rendered_without_source_is_invalid() {
        let err = File::from_spec(
            Metadata::new("/etc/motd", "file", "rendered"),
            FileSpec::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::InvalidEntry { .. }));
    }

    #[test]
    fn unknown_file_state_is_invalid() {
        let err = File::from_spec(
            Metadata::new("/etc/motd", "file", "templated"),
            FileSpec::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("templated"));
    }
}
