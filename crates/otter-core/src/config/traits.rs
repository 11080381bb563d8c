//! Layered configuration traits

use crate::errors::{OtterError, Result};
use std::path::Path;

/// A configuration assembled from defaults, a file, the environment and the
/// command line, in that order of precedence (lowest first).
pub trait LayeredConfig: Clone + Default + Send + Sync + 'static {
    /// Load configuration from a file. A missing file yields defaults.
    fn load_from_file(path: &Path) -> Result<Self>;

    /// Apply `(name, value)` pairs shaped like environment variables.
    fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>;

    /// Apply the process environment.
    fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Set a value by key (command-line overrides).
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<()>;

    /// Validate the assembled configuration.
    fn validate(&self) -> Result<()>;
}

/// Parse a numeric setting, naming the key on failure.
pub(crate) fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OtterError::invalid(format!("Invalid number for {key}: {value}")))
}
