//! Random effect handler
//!
//! Production implementation of `RandomEffects` backed by the thread-local
//! generator. Seeded doubles live in `otter-testkit`.

#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use otter_core::effects::RandomEffects;
use rand::{Rng, RngCore};

/// Real random handler using the operating system seeded generator
#[derive(Debug, Clone, Default)]
pub struct RealRandomHandler;

impl RealRandomHandler {
    /// Create a new real random handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RandomEffects for RealRandomHandler {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    async fn random_below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_stay_below_bound() {
        let handler = RealRandomHandler::new();
        for _ in 0..100 {
            assert!(handler.random_below(36).await < 36);
        }
        assert_eq!(handler.random_bytes(8).await.len(), 8);
    }
}
