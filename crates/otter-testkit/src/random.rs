//! Seeded randomness for reproducible command ids.

#![allow(clippy::disallowed_types)]

use async_trait::async_trait;
use otter_core::effects::RandomEffects;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::{Arc, Mutex};

/// Deterministic random handler
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: Arc<Mutex<StdRng>>,
}

impl SeededRandom {
    /// Generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(42)
    }
}

#[async_trait]
impl RandomEffects for SeededRandom {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.lock().unwrap().fill_bytes(&mut bytes);
        bytes
    }

    async fn random_below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.rng.lock().unwrap().gen_range(0..bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_seed_same_sequence() {
        let a = SeededRandom::new(7);
        let b = SeededRandom::new(7);
        for _ in 0..16 {
            assert_eq!(a.random_below(36).await, b.random_below(36).await);
        }
    }
}
