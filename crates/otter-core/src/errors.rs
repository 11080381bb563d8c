//! Unified error system for Otter core
//!
//! Domain errors (`GraphError`, `CoordinationError`, `CapabilityError`) keep
//! their structure and fold into `OtterError` at crate boundaries.

use crate::effects::{CapabilityError, CoordinationError};
use crate::state::GraphError;

/// Unified error type for all Otter operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum OtterError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// State graph validation failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Coordination store operation failed
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// Operating system capability failed
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Local IO failed
    #[error("IO error: {message}")]
    Io {
        /// Error message describing the IO failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl OtterError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for Otter operations
pub type Result<T> = std::result::Result<T, OtterError>;

impl From<serde_json::Error> for OtterError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OtterError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<toml::de::Error> for OtterError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid(format!("Invalid TOML: {err}"))
    }
}

impl From<std::io::Error> for OtterError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err: OtterError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, OtterError::NotFound { .. }));
    }

    #[test]
    fn graph_errors_display_transparently() {
        let err: OtterError = GraphError::MissingRequirement {
            metadata: Metadata::new("mesos", "package", "installed"),
            requirement: "zookeeper".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("zookeeper"));
        assert!(msg.contains("mesos"));
    }
}
