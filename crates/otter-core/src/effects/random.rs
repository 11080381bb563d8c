//! Randomness effect trait, used for command nonces.

use async_trait::async_trait;
use std::sync::Arc;

/// Source of random values.
#[async_trait]
pub trait RandomEffects: Send + Sync {
    /// Fill a fresh buffer with random bytes.
    async fn random_bytes(&self, len: usize) -> Vec<u8>;

    /// A uniformly random index below `bound` (`bound` must be non-zero).
    async fn random_below(&self, bound: u64) -> u64;
}

/// Blanket implementation for Arc<T> where T: RandomEffects
#[async_trait]
impl<T: RandomEffects + ?Sized> RandomEffects for Arc<T> {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        (**self).random_bytes(len).await
    }

    async fn random_below(&self, bound: u64) -> u64 {
        (**self).random_below(bound).await
    }
}
