//! Declarative state file loader.
//!
//! An example state file:
//!
//! ```yaml
//! /root/readme.md:            # entry name
//!   file.rendered:            # <kind>.<desiredState>
//!     mode: 644               # variant fields
//!     source: http://example.com/README.md
//! docker:
//!   package.installed:
//!     version: 1.9.1
//!     require:
//!       - /root/readme.md
//! ```
//!
//! JSON documents are accepted too, since JSON is valid YAML.

use super::StateGraph;
use crate::errors::{OtterError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fallback location when the requested state file does not exist.
pub const HOME_STATE_FILE: &str = ".otter";

/// Load and validate a state graph from a file.
///
/// A missing `path` falls back to `~/.otter`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<StateGraph> {
    let resolved = resolve(path.as_ref())?;
    info!(path = %resolved.display(), "loading state file");
    let data = std::fs::read_to_string(&resolved).map_err(|e| {
        OtterError::io(format!("Failed to read {}: {e}", resolved.display()))
    })?;
    load_from_str(&data)
}

/// Parse and validate a YAML (or JSON) state document.
pub fn load_from_str(data: &str) -> Result<StateGraph> {
    let document: serde_json::Value = serde_yaml::from_str(data)?;
    let graph = StateGraph::from_declarative(document)?;
    debug!(entries = graph.len(), "state graph validated");
    Ok(graph)
}

fn resolve(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    let home = dirs::home_dir()
        .ok_or_else(|| OtterError::not_found("home directory for state fallback"))?;
    let fallback = home.join(HOME_STATE_FILE);
    debug!(
        requested = %path.display(),
        fallback = %fallback.display(),
        "state file missing, using home fallback"
    );
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GraphError, Metadata};
    use std::io::Write;

    const SIMPLE: &str = r#"
Really Cool File:
  file.rendered:
    mode: 644
    source: http://example.com/repo/cool_file.txt
    path: /root/really-cool-file.txt
docker:
  file.rendered:
    mode: 644
    source: http://example.com/repo/docker.default
    path: /etc/default/docker
  service.running:
    running: true
  package.installed:
    version: 1.9.1
    require:
      - Really Cool File
"#;

    const MISSING: &str = r#"
docker:
  package.installed:
    version: 1.9.1
mesos:
  package.installed:
    require:
      - docker
      - zookeeper
"#;

    const CIRCULAR: &str = r#"
docker:
  package.installed:
    version: 1.9.1
    require:
      - mesos
mesos:
  package.installed:
    require:
      - docker
"#;

    #[test]
    fn loads_every_section() {
        let graph = load_from_str(SIMPLE).unwrap();
        assert_eq!(graph.len(), 4);
        assert!(graph.contains(&Metadata::new("docker", "service", "running")));
        assert!(graph.contains(&Metadata::new("Really Cool File", "file", "rendered")));
    }

    #[test]
    fn missing_requirement_is_reported() {
        let err = load_from_str(MISSING).unwrap_err();
        match err {
            OtterError::Graph(GraphError::MissingRequirement { requirement, .. }) => {
                assert_eq!(requirement, "zookeeper");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn circular_requirement_is_reported() {
        let err = load_from_str(CIRCULAR).unwrap_err();
        assert!(matches!(err, OtterError::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn malformed_section_key_is_reported() {
        let err = load_from_str("docker:\n  package: {}\n").unwrap_err();
        assert!(matches!(
            err,
            OtterError::Graph(GraphError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SIMPLE.as_bytes()).unwrap();
        let graph = load_from_path(file.path()).unwrap();
        assert_eq!(graph.len(), 4);
    }
}
