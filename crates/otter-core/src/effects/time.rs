//! Physical time effect trait.
//!
//! Heartbeat scheduling and timestamps go through this trait so the
//! membership state machine can be driven by a controllable clock in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Error type for time operations.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum TimeError {
    /// The clock could not be read.
    #[error("Time service unavailable")]
    ServiceUnavailable,
    /// Catch-all failure.
    #[error("Operation failed: {reason}")]
    OperationFailed {
        /// Failure description
        reason: String,
    },
}

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalTime {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// Construct from milliseconds.
    pub fn from_millis(ts_ms: u64) -> Self {
        Self { ts_ms }
    }
}

/// Wall-clock and sleep capability.
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current wall-clock time.
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError>;

    /// Suspend the caller.
    async fn sleep(&self, duration: Duration);
}

/// Blanket implementation for Arc<T> where T: PhysicalTimeEffects
#[async_trait]
impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for Arc<T> {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        (**self).physical_time().await
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}
