//! Shutdown signal for Otter's long-running loops.
//!
//! `MembershipRegistrar::run`, `CommandListener::run` and `Daemon::run` each
//! take a `CancellationToken` and race it against the heartbeat sleep or the
//! command watch. The binary passes the ctrl-c driven `ShutdownToken` from
//! `otter-effects`.

use async_trait::async_trait;
use std::sync::Arc;

/// Cooperative stop request for a `run` loop.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Resolves when cancellation is requested.
    async fn cancelled(&self);

    /// Non-blocking cancellation check.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Runs a loop until it fails or its task is aborted, as the tests do.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl CancellationToken for NeverCancel {
    async fn cancelled(&self) {
        std::future::pending::<()>().await;
    }
}

#[async_trait]
impl<T: CancellationToken + ?Sized> CancellationToken for Arc<T> {
    async fn cancelled(&self) {
        (**self).cancelled().await;
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
