//! Coordination store effect trait.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `otter-effects` (memory and etcd handlers)
//! - **Usage**: membership, state distribution, command dispatch and results
//!
//! The store is a strongly-consistent hierarchical key-value service. Keys are
//! slash-separated paths; a "directory" is any prefix that has children.
//! `watch_once` is the only blocking primitive: every "wait for X" in the
//! protocol is built from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Errors reported by a coordination store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CoordinationError {
    /// A watch did not observe a change before its deadline.
    #[error("Timeout after {timeout_ms}ms waiting on {key}")]
    Timeout {
        /// Watched key
        key: String,
        /// Deadline that expired
        timeout_ms: u64,
    },
    /// The key (or directory) does not exist.
    #[error("Key not found: {key}")]
    NotFound {
        /// Missing key
        key: String,
    },
    /// A compare-and-swap precondition did not hold.
    #[error("Compare failed on {key}: {reason}")]
    CompareFailed {
        /// Key being written
        key: String,
        /// Store-reported reason
        reason: String,
    },
    /// The requested wait index has been compacted out of the event history.
    #[error("Event index {index} has been cleared")]
    IndexCleared {
        /// Requested index
        index: u64,
    },
    /// Connectivity or protocol failure talking to the store.
    #[error("Transport error: {reason}")]
    Transport {
        /// Underlying failure
        reason: String,
    },
    /// The store returned a payload that could not be decoded.
    #[error("Decode error: {reason}")]
    Decode {
        /// Decoding failure
        reason: String,
    },
    /// The store handle has been shut down.
    #[error("Coordination store closed")]
    Closed,
}

impl CoordinationError {
    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// True when the error means the key is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the error is a watch deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A single key with its value and modification index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Full key path
    pub key: String,
    /// Stored value; empty for directories
    pub value: String,
    /// Store-wide index of the last mutation of this key
    pub modified_index: u64,
}

/// Options for a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expire the key after this long
    pub ttl: Option<Duration>,
    /// Only write if the current value equals this (compare-and-swap)
    pub prev_value: Option<String>,
}

impl SetOptions {
    /// Plain unconditional write without expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key expiry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Condition the write on the current value.
    pub fn with_prev_value(mut self, prev: impl Into<String>) -> Self {
        self.prev_value = Some(prev.into());
        self
    }
}

/// Version information the store reports for a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Global mutation index of this write
    pub index: u64,
    /// Per-key version counter, when the store tracks one
    pub version: Option<u64>,
}

/// Kind of mutation observed by a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchAction {
    /// Key created or overwritten
    Set,
    /// Key conditionally swapped
    CompareAndSwap,
    /// Key deleted
    Delete,
    /// Key removed by TTL expiry
    Expire,
}

impl WatchAction {
    /// True for mutations that leave a value behind.
    pub fn is_write(self) -> bool {
        matches!(self, Self::Set | Self::CompareAndSwap)
    }
}

/// One change observed by `watch_once`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// What happened
    pub action: WatchAction,
    /// Key that changed
    pub key: String,
    /// New value; `None` for deletions and expirations
    pub value: Option<String>,
    /// Global index of the change
    pub index: u64,
}

/// Parameters for `watch_once`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Also report changes to keys below the watched key
    pub recursive: bool,
    /// Give up with `CoordinationError::Timeout` after this long
    pub timeout: Option<Duration>,
    /// Report the first change at or after this index, including history
    pub wait_index: Option<u64>,
}

impl WatchOptions {
    /// Watch a single key without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the subtree below the key.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Bound the wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Start from a known index so changes racing the watch are not lost.
    pub fn from_index(mut self, index: u64) -> Self {
        self.wait_index = Some(index);
        self
    }
}

/// Coordination store contract.
#[async_trait]
pub trait CoordinationEffects: Send + Sync {
    /// Read one key.
    async fn get(&self, key: &str) -> Result<Node, CoordinationError>;

    /// Read the immediate children of a directory key.
    async fn list(&self, dir: &str) -> Result<Vec<Node>, CoordinationError>;

    /// Write a key, optionally with expiry and compare-and-swap.
    async fn set(
        &self,
        key: &str,
        value: &str,
        options: SetOptions,
    ) -> Result<Revision, CoordinationError>;

    /// Suspend until the next change under `key`.
    async fn watch_once(
        &self,
        key: &str,
        options: WatchOptions,
    ) -> Result<WatchEvent, CoordinationError>;
}

/// Blanket implementation for Arc<T> where T: CoordinationEffects
#[async_trait]
impl<T: CoordinationEffects + ?Sized> CoordinationEffects for Arc<T> {
    async fn get(&self, key: &str) -> Result<Node, CoordinationError> {
        (**self).get(key).await
    }

    async fn list(&self, dir: &str) -> Result<Vec<Node>, CoordinationError> {
        (**self).list(dir).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        options: SetOptions,
    ) -> Result<Revision, CoordinationError> {
        (**self).set(key, value, options).await
    }

    async fn watch_once(
        &self,
        key: &str,
        options: WatchOptions,
    ) -> Result<WatchEvent, CoordinationError> {
        (**self).watch_once(key, options).await
    }
}
