//! Configuration layering for the binary: file, then environment, then flags.

use anyhow::{Context, Result};
use otter_core::{LayeredConfig, OtterConfig};
use std::path::{Path, PathBuf};

/// Command-line overrides; `None` leaves the lower layers alone.
#[derive(Debug, Default)]
pub struct Overrides {
    pub endpoints: Option<String>,
    pub state: Option<PathBuf>,
    pub hostname: Option<String>,
}

/// Assemble and validate the runtime configuration.
pub fn load(path: &Path, overrides: &Overrides) -> Result<OtterConfig> {
    let mut config = OtterConfig::load_from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.merge_with_env()?;
    apply(&mut config, overrides)?;
    config.validate()?;
    Ok(config)
}

fn apply(config: &mut OtterConfig, overrides: &Overrides) -> Result<()> {
    if let Some(endpoints) = &overrides.endpoints {
        config.set_from_string("endpoints", endpoints)?;
    }
    if let Some(state) = &overrides.state {
        config.state_path = state.clone();
    }
    if let Some(hostname) = &overrides.hostname {
        config.set_from_string("hostname", hostname)?;
    }
    Ok(())
}
