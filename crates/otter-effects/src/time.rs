//! Time effect handler - production only
//!
//! Controllable clocks for tests live in `otter-testkit`.

use async_trait::async_trait;
use otter_core::effects::{PhysicalTime, PhysicalTimeEffects, TimeError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Real time handler for production use
///
/// Stateless; delegates to the system clock and the tokio timer.
#[derive(Debug, Clone, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    #[allow(clippy::disallowed_methods)]
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimeError::ServiceUnavailable)?;
        Ok(PhysicalTime::from_millis(elapsed.as_millis() as u64))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
