//! Controllable clock
//!
//! Timestamps come from a counter the test owns; `sleep` waits on the tokio
//! timer (so paused-time tests auto-advance) and then moves the counter
//! forward by the slept duration.

#![allow(clippy::disallowed_types)]

use async_trait::async_trait;
use otter_core::effects::{PhysicalTime, PhysicalTimeEffects, TimeError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2022-01-01T00:00:00Z
pub const DEFAULT_START_MS: u64 = 1_640_995_200_000;

/// Controllable time source for deterministic testing
#[derive(Debug, Clone)]
pub struct ControllableClock {
    now_ms: Arc<Mutex<u64>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
    broken: Arc<Mutex<bool>>,
}

impl ControllableClock {
    /// Clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(Mutex::new(start_ms)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            broken: Arc::new(Mutex::new(false)),
        }
    }

    /// Advance the clock without sleeping.
    pub fn advance(&self, by: Duration) {
        *self.now_ms.lock().unwrap() += by.as_millis() as u64;
    }

    /// Current reading in milliseconds.
    pub fn now_ms(&self) -> u64 {
        *self.now_ms.lock().unwrap()
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Make `physical_time` fail until repaired.
    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap() = broken;
    }
}

impl Default for ControllableClock {
    fn default() -> Self {
        Self::new(DEFAULT_START_MS)
    }
}

#[async_trait]
impl PhysicalTimeEffects for ControllableClock {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        if *self.broken.lock().unwrap() {
            return Err(TimeError::ServiceUnavailable);
        }
        Ok(PhysicalTime::from_millis(self.now_ms()))
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::time::sleep(duration).await;
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_moves_the_clock() {
        let clock = ControllableClock::default();
        clock.sleep(Duration::from_secs(15)).await;
        let now = clock.physical_time().await.unwrap();
        assert_eq!(now.ts_ms, DEFAULT_START_MS + 15_000);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(15)]);
    }
}
