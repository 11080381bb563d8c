//! Role-level errors.

use otter_core::effects::{CoordinationError, TimeError};
use otter_core::OtterError;

/// Membership registrar failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistrarError {
    /// Another process is heartbeating under the same host name.
    #[error("Another host is already registered with this hostname: {host} ({reason})")]
    IdentityCollision {
        /// Contested host name
        host: String,
        /// What gave the collision away
        reason: String,
    },
    /// The clock could not be read.
    #[error("Clock unavailable: {0}")]
    Clock(#[from] TimeError),
    /// Store operation failed.
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

impl RegistrarError {
    /// Errors that must stop the member process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IdentityCollision { .. } | Self::Coordination(CoordinationError::Closed)
        )
    }
}

/// Command listener failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ListenerError {
    /// The stored state graph could not be decoded or validated.
    #[error("Bad state payload for {host}: {reason}")]
    MalformedState {
        /// Host whose state slot is broken
        host: String,
        /// Decode or validation failure
        reason: String,
    },
    /// Results could not be encoded for publication.
    #[error("Unable to publish results for {id}: {reason}")]
    Publish {
        /// Command id
        id: String,
        /// Encoding failure
        reason: String,
    },
    /// Store operation failed.
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

impl ListenerError {
    /// Errors that must stop the member process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedState { .. } | Self::Coordination(CoordinationError::Closed)
        )
    }
}

/// Member process failure: whichever loop failed first.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DaemonError {
    /// Heartbeat loop stopped.
    #[error("membership: {0}")]
    Registrar(#[from] RegistrarError),
    /// Command loop stopped.
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
}

impl From<RegistrarError> for OtterError {
    fn from(err: RegistrarError) -> Self {
        match err {
            RegistrarError::Coordination(e) => Self::Coordination(e),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<ListenerError> for OtterError {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::Coordination(e) => Self::Coordination(e),
            ListenerError::MalformedState { .. } | ListenerError::Publish { .. } => {
                Self::serialization(err.to_string())
            }
        }
    }
}

impl From<DaemonError> for OtterError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::Registrar(e) => e.into(),
            DaemonError::Listener(e) => e.into(),
        }
    }
}
