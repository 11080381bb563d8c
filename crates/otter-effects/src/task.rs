//! Shutdown signalling for long-running roles.

use async_trait::async_trait;
use otter_core::effects::CancellationToken;
use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of a shutdown signal. Dropping it does not cancel.
#[derive(Debug)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Observer side of a shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    receiver: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Create a fresh signal.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Hand out an observer.
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CancellationToken for ShutdownToken {
    async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // A closed channel can never signal again; treat it as cancelled.
        let _ = receiver.wait_for(|stop| *stop).await;
    }

    fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn token_observes_shutdown() {
        let handle = ShutdownHandle::new();
        let token = handle.token();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn late_tokens_see_earlier_shutdown() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        let token = handle.token();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
