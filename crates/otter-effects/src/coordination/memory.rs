//! In-memory coordination store
//!
//! Single-process stand-in for etcd used by tests and local runs. It keeps
//! the properties the protocol relies on: a store-wide mutation index, a
//! per-key version, compare-and-swap, TTL expiry, and watches that can
//! resume from a past index via a bounded event history.
//!
//! Expiry is evaluated lazily: expired keys are dropped (and reported to
//! watchers) on the next operation that touches the store.

use async_trait::async_trait;
use otter_core::effects::{
    CoordinationEffects, CoordinationError, Node, Revision, SetOptions, WatchAction, WatchEvent,
    WatchOptions,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

/// Events retained for `wait_index` watches.
pub const DEFAULT_HISTORY: usize = 1000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    modified_index: u64,
    version: u64,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct StoreState {
    index: u64,
    keys: BTreeMap<String, Entry>,
    history: VecDeque<WatchEvent>,
}

/// In-memory coordination handler
#[derive(Clone)]
pub struct MemoryCoordinationHandler {
    state: Arc<Mutex<StoreState>>,
    events: broadcast::Sender<WatchEvent>,
    history_limit: usize,
}

impl MemoryCoordinationHandler {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Create an empty store retaining `limit` past events
    pub fn with_history(limit: usize) -> Self {
        let (events, _) = broadcast::channel(limit.max(16));
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            events,
            history_limit: limit.max(1),
        }
    }

    /// Current store-wide index.
    pub async fn current_index(&self) -> u64 {
        self.state.lock().await.index
    }

    /// Delete a key, notifying watchers.
    pub async fn delete(&self, key: &str) -> Result<(), CoordinationError> {
        let key = normalize(key);
        let mut state = self.state.lock().await;
        self.purge_expired(&mut state);
        if state.keys.remove(&key).is_none() {
            return Err(CoordinationError::NotFound { key });
        }
        self.record(&mut state, WatchAction::Delete, key, None);
        Ok(())
    }

    fn record(
        &self,
        state: &mut StoreState,
        action: WatchAction,
        key: String,
        value: Option<String>,
    ) -> u64 {
        state.index += 1;
        let event = WatchEvent {
            action,
            key,
            value,
            index: state.index,
        };
        state.history.push_back(event.clone());
        while state.history.len() > self.history_limit {
            state.history.pop_front();
        }
        // No receivers is fine.
        let _ = self.events.send(event);
        state.index
    }

    fn purge_expired(&self, state: &mut StoreState) {
        let now = Instant::now();
        let expired: Vec<String> = state
            .keys
            .iter()
            .filter(|(_, entry)| entry.expires_at.is_some_and(|at| at <= now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            state.keys.remove(&key);
            tracing::trace!(key = %key, "key expired");
            self.record(state, WatchAction::Expire, key, None);
        }
    }

    fn scan_history(
        state: &StoreState,
        key: &str,
        recursive: bool,
        from: u64,
    ) -> Result<Option<WatchEvent>, CoordinationError> {
        if let Some(oldest) = state.history.front() {
            if from < oldest.index && oldest.index > 1 {
                return Err(CoordinationError::IndexCleared { index: from });
            }
        }
        Ok(state
            .history
            .iter()
            .find(|event| event.index >= from && matches(key, recursive, &event.key))
            .cloned())
    }
}

impl Default for MemoryCoordinationHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn matches(watched: &str, recursive: bool, changed: &str) -> bool {
    if watched == changed {
        return true;
    }
    if !recursive {
        return false;
    }
    watched == "/"
        || changed
            .strip_prefix(watched)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl CoordinationEffects for MemoryCoordinationHandler {
    async fn get(&self, key: &str) -> Result<Node, CoordinationError> {
        let key = normalize(key);
        let mut state = self.state.lock().await;
        self.purge_expired(&mut state);
        state
            .keys
            .get(&key)
            .map(|entry| Node {
                key: key.clone(),
                value: entry.value.clone(),
                modified_index: entry.modified_index,
            })
            .ok_or(CoordinationError::NotFound { key })
    }

    async fn list(&self, dir: &str) -> Result<Vec<Node>, CoordinationError> {
        let dir = normalize(dir);
        let prefix = if dir == "/" {
            dir.clone()
        } else {
            format!("{dir}/")
        };
        let mut state = self.state.lock().await;
        self.purge_expired(&mut state);

        let mut children: BTreeMap<String, Node> = BTreeMap::new();
        for (key, entry) in state.keys.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            let (child, is_leaf) = match rest.split_once('/') {
                Some((segment, _)) => (segment, false),
                None => (rest, true),
            };
            let child_key = format!("{prefix}{child}");
            let node = children.entry(child_key.clone()).or_insert_with(|| Node {
                key: child_key,
                value: String::new(),
                modified_index: 0,
            });
            if is_leaf {
                node.value = entry.value.clone();
            }
            node.modified_index = node.modified_index.max(entry.modified_index);
        }

        if children.is_empty() {
            return Err(CoordinationError::NotFound { key: dir });
        }
        Ok(children.into_values().collect())
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        options: SetOptions,
    ) -> Result<Revision, CoordinationError> {
        let key = normalize(key);
        let mut state = self.state.lock().await;
        self.purge_expired(&mut state);

        let previous = state.keys.get(&key).map(|entry| entry.version);
        let action = match &options.prev_value {
            Some(expected) => {
                let Some(current) = state.keys.get(&key) else {
                    return Err(CoordinationError::NotFound { key });
                };
                if current.value != *expected {
                    return Err(CoordinationError::CompareFailed {
                        reason: format!("[{expected} != {}]", current.value),
                        key,
                    });
                }
                WatchAction::CompareAndSwap
            }
            None => WatchAction::Set,
        };

        let index = self.record(&mut state, action, key.clone(), Some(value.to_string()));
        let version = previous.map_or(1, |v| v + 1);
        state.keys.insert(
            key,
            Entry {
                value: value.to_string(),
                modified_index: index,
                version,
                expires_at: options.ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(Revision {
            index,
            version: Some(version),
        })
    }

    async fn watch_once(
        &self,
        key: &str,
        options: WatchOptions,
    ) -> Result<WatchEvent, CoordinationError> {
        let key = normalize(key);
        // Subscribe before inspecting history so nothing falls in between.
        let mut receiver = self.events.subscribe();
        let mut from = {
            let mut state = self.state.lock().await;
            self.purge_expired(&mut state);
            match options.wait_index {
                Some(index) => {
                    if let Some(event) =
                        Self::scan_history(&state, &key, options.recursive, index)?
                    {
                        return Ok(event);
                    }
                    index.max(state.index + 1)
                }
                None => state.index + 1,
            }
        };

        let wait = async {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if event.index >= from && matches(&key, options.recursive, &event.key) {
                            return Ok(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let state = self.state.lock().await;
                        match Self::scan_history(&state, &key, options.recursive, from) {
                            Ok(Some(event)) => return Ok(event),
                            Ok(None) => from = state.index + 1,
                            Err(e) => return Err(e),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(CoordinationError::Closed);
                    }
                }
            }
        };

        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                CoordinationError::Timeout {
                    key: key.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            })?,
            None => wait.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryCoordinationHandler::new();
        let rev = store.set("/state/a", "x", SetOptions::new()).await.unwrap();
        assert_eq!(rev.version, Some(1));
        let node = store.get("/state/a").await.unwrap();
        assert_eq!(node.value, "x");
        assert_eq!(node.modified_index, rev.index);
    }

    #[tokio::test]
    async fn versions_count_writes_per_key() {
        let store = MemoryCoordinationHandler::new();
        store.set("/a", "1", SetOptions::new()).await.unwrap();
        store.set("/b", "1", SetOptions::new()).await.unwrap();
        let rev = store.set("/a", "2", SetOptions::new()).await.unwrap();
        assert_eq!(rev.version, Some(2));
        assert_eq!(rev.index, 3);
    }

    #[tokio::test]
    async fn compare_and_swap() {
        let store = MemoryCoordinationHandler::new();
        let err = store
            .set("/ping/a", "t1", SetOptions::new().with_prev_value("t0"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        store.set("/ping/a", "t1", SetOptions::new()).await.unwrap();
        let err = store
            .set("/ping/a", "t2", SetOptions::new().with_prev_value("t0"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::CompareFailed { .. }));

        store
            .set("/ping/a", "t2", SetOptions::new().with_prev_value("t1"))
            .await
            .unwrap();
        assert_eq!(store.get("/ping/a").await.unwrap().value, "t2");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expires_keys() {
        let store = MemoryCoordinationHandler::new();
        store
            .set(
                "/ping/a",
                "t",
                SetOptions::new().with_ttl(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("/ping/a").await.is_ok());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("/ping/a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_returns_immediate_children() {
        let store = MemoryCoordinationHandler::new();
        store.set("/command/a/state", "n1", SetOptions::new()).await.unwrap();
        store.set("/command/b/apply", "n2", SetOptions::new()).await.unwrap();
        store.set("/ping/a", "t", SetOptions::new()).await.unwrap();

        let hosts = store.list("/command").await.unwrap();
        let keys: Vec<_> = hosts.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, vec!["/command/a", "/command/b"]);

        let pings = store.list("/ping").await.unwrap();
        assert_eq!(pings[0].value, "t");

        assert!(store.list("/result").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn watch_sees_later_writes() {
        let store = MemoryCoordinationHandler::new();
        let watcher = tokio::spawn({
            let store = store.clone();
            async move {
                store
                    .watch_once("/command/a", WatchOptions::new().recursive())
                    .await
            }
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.set("/command/b/state", "x", SetOptions::new()).await.unwrap();
        store.set("/command/a/state", "n", SetOptions::new()).await.unwrap();
        let event = watcher.await.unwrap().unwrap();
        assert_eq!(event.key, "/command/a/state");
        assert_eq!(event.value.as_deref(), Some("n"));
        assert_eq!(event.action, WatchAction::Set);
    }

    #[tokio::test]
    async fn wait_index_replays_history() {
        let store = MemoryCoordinationHandler::new();
        let start = store.current_index().await + 1;
        store.set("/result/abc", "[]", SetOptions::new()).await.unwrap();
        let event = store
            .watch_once("/result/abc", WatchOptions::new().from_index(start))
            .await
            .unwrap();
        assert_eq!(event.value.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn cleared_history_is_reported() {
        let store = MemoryCoordinationHandler::with_history(2);
        for i in 0..5 {
            store.set("/k", &i.to_string(), SetOptions::new()).await.unwrap();
        }
        let err = store
            .watch_once("/k", WatchOptions::new().from_index(1))
            .await
            .unwrap_err();
        assert_eq!(err, CoordinationError::IndexCleared { index: 1 });
    }

    #[tokio::test]
    async fn watch_times_out() {
        let store = MemoryCoordinationHandler::new();
        let err = store
            .watch_once(
                "/result/none",
                WatchOptions::new().with_timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
