//! etcd v2 keys API handler
//!
//! Talks to `/v2/keys` over HTTP with reqwest. Endpoints are tried in order;
//! a transport failure moves on to the next endpoint and the last one that
//! answered is remembered for subsequent requests.
//!
//! The v2 API has no per-key version counter, so `Revision::version` is
//! always `None` and collisions surface as compare-and-swap failures.

use async_trait::async_trait;
use otter_core::effects::{
    CoordinationEffects, CoordinationError, Node, Revision, SetOptions, WatchAction, WatchEvent,
    WatchOptions,
};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KEY_NOT_FOUND: u64 = 100;
const TEST_FAILED: u64 = 101;
const EVENT_INDEX_CLEARED: u64 = 401;

/// Wire form of a node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdNode {
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
    #[serde(default)]
    modified_index: u64,
}

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    action: String,
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdErrorBody {
    error_code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: String,
    #[serde(default)]
    index: u64,
}

/// Whether a request may run without a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    Request,
    Unbounded,
}

/// etcd v2 coordination handler
#[derive(Clone)]
pub struct EtcdCoordinationHandler {
    client: Client,
    endpoints: Arc<Vec<Url>>,
    preferred: Arc<AtomicUsize>,
    request_timeout: Duration,
}

impl EtcdCoordinationHandler {
    /// Create a handler for `endpoints` (e.g. `http://127.0.0.1:2379`).
    pub fn new<I, S>(endpoints: I, request_timeout: Duration) -> Result<Self, CoordinationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|e| {
                Url::parse(e.as_ref()).map_err(|err| {
                    CoordinationError::transport(format!("invalid endpoint {}: {err}", e.as_ref()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if endpoints.is_empty() {
            return Err(CoordinationError::transport("no endpoints configured"));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| CoordinationError::transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
            preferred: Arc::new(AtomicUsize::new(0)),
            request_timeout,
        })
    }

    fn key_url(base: &Url, key: &str) -> Result<Url, CoordinationError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| CoordinationError::transport(format!("endpoint cannot be a base: {base}")))?
            .pop_if_empty()
            .extend(["v2", "keys"])
            .extend(key.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Send a request built by `build`, failing over across endpoints.
    async fn send<F>(
        &self,
        key: &str,
        deadline: Deadline,
        build: F,
    ) -> Result<String, CoordinationError>
    where
        F: Fn(&Client, Url) -> RequestBuilder + Send + Sync,
    {
        let count = self.endpoints.len();
        let start = self.preferred.load(Ordering::Relaxed) % count;
        let mut last_error = CoordinationError::transport("no endpoints tried");
        for offset in 0..count {
            let slot = (start + offset) % count;
            let url = Self::key_url(&self.endpoints[slot], key)?;
            let mut request = build(&self.client, url);
            if deadline == Deadline::Request {
                request = request.timeout(self.request_timeout);
            }
            match request.send().await {
                Ok(response) => {
                    self.preferred.store(slot, Ordering::Relaxed);
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| CoordinationError::transport(e.to_string()))?;
                    if status.is_success() {
                        return Ok(body);
                    }
                    return Err(Self::decode_error(key, status.as_u16(), &body));
                }
                Err(e) => {
                    tracing::debug!(
                        endpoint = %self.endpoints[slot],
                        error = %e,
                        "etcd endpoint unreachable"
                    );
                    last_error = CoordinationError::transport(e.to_string());
                }
            }
        }
        Err(last_error)
    }

    fn decode_error(key: &str, status: u16, body: &str) -> CoordinationError {
        match serde_json::from_str::<EtcdErrorBody>(body) {
            Ok(err) => match err.error_code {
                KEY_NOT_FOUND => CoordinationError::NotFound {
                    key: if err.cause.is_empty() {
                        key.to_string()
                    } else {
                        err.cause
                    },
                },
                TEST_FAILED => CoordinationError::CompareFailed {
                    key: key.to_string(),
                    reason: err.cause,
                },
                EVENT_INDEX_CLEARED => CoordinationError::IndexCleared { index: err.index },
                code => CoordinationError::transport(format!(
                    "etcd error {code}: {} ({})",
                    err.message, err.cause
                )),
            },
            Err(_) => CoordinationError::transport(format!("HTTP {status}: {body}")),
        }
    }

    fn parse(body: &str) -> Result<EtcdResponse, CoordinationError> {
        serde_json::from_str(body).map_err(|e| CoordinationError::decode(e.to_string()))
    }

    fn action(name: &str) -> Result<WatchAction, CoordinationError> {
        match name {
            "set" | "create" | "update" => Ok(WatchAction::Set),
            "compareAndSwap" => Ok(WatchAction::CompareAndSwap),
            "delete" | "compareAndDelete" => Ok(WatchAction::Delete),
            "expire" => Ok(WatchAction::Expire),
            other => Err(CoordinationError::decode(format!(
                "unknown watch action: {other}"
            ))),
        }
    }

    async fn watch_request(
        &self,
        key: &str,
        options: &WatchOptions,
    ) -> Result<WatchEvent, CoordinationError> {
        loop {
            let body = self
                .send(key, Deadline::Unbounded, |client, url| {
                    let mut query = vec![("wait", "true".to_string())];
                    if options.recursive {
                        query.push(("recursive", "true".to_string()));
                    }
                    if let Some(index) = options.wait_index {
                        query.push(("waitIndex", index.to_string()));
                    }
                    client.request(Method::GET, url).query(&query)
                })
                .await?;
            // etcd closes long polls with an empty body; poll again.
            if body.trim().is_empty() {
                continue;
            }
            let response = Self::parse(&body)?;
            let action = Self::action(&response.action)?;
            return Ok(WatchEvent {
                action,
                key: response.node.key.unwrap_or_else(|| key.to_string()),
                value: if action.is_write() {
                    response.node.value
                } else {
                    None
                },
                index: response.node.modified_index,
            });
        }
    }
}

#[async_trait]
impl CoordinationEffects for EtcdCoordinationHandler {
    async fn get(&self, key: &str) -> Result<Node, CoordinationError> {
        let body = self
            .send(key, Deadline::Request, |client, url| client.get(url))
            .await?;
        let node = Self::parse(&body)?.node;
        Ok(Node {
            key: node.key.unwrap_or_else(|| key.to_string()),
            value: node.value.unwrap_or_default(),
            modified_index: node.modified_index,
        })
    }

    async fn list(&self, dir: &str) -> Result<Vec<Node>, CoordinationError> {
        let body = self
            .send(dir, Deadline::Request, |client, url| {
                client.get(url).query(&[("sorted", "true")])
            })
            .await?;
        let node = Self::parse(&body)?.node;
        if !node.dir {
            return Err(CoordinationError::NotFound {
                key: dir.to_string(),
            });
        }
        Ok(node
            .nodes
            .into_iter()
            .map(|child| Node {
                key: child.key.unwrap_or_default(),
                value: child.value.unwrap_or_default(),
                modified_index: child.modified_index,
            })
            .collect())
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        options: SetOptions,
    ) -> Result<Revision, CoordinationError> {
        let mut form = vec![("value", value.to_string())];
        if let Some(ttl) = options.ttl {
            form.push(("ttl", ttl.as_secs().max(1).to_string()));
        }
        if let Some(prev) = &options.prev_value {
            form.push(("prevValue", prev.clone()));
        }
        let body = self
            .send(key, Deadline::Request, |client, url| {
                client.put(url).form(&form)
            })
            .await?;
        let node = Self::parse(&body)?.node;
        Ok(Revision {
            index: node.modified_index,
            version: None,
        })
    }

    async fn watch_once(
        &self,
        key: &str,
        options: WatchOptions,
    ) -> Result<WatchEvent, CoordinationError> {
        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.watch_request(key, &options))
                .await
                .map_err(|_| CoordinationError::Timeout {
                    key: key.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })?,
            None => self.watch_request(key, &options).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_urls_keep_the_endpoint_path() {
        let base = Url::parse("http://127.0.0.1:2379").unwrap();
        let url = EtcdCoordinationHandler::key_url(&base, "/command/web-1/state").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:2379/v2/keys/command/web-1/state");

        let base = Url::parse("http://proxy/etcd/").unwrap();
        let url = EtcdCoordinationHandler::key_url(&base, "/ping").unwrap();
        assert_eq!(url.as_str(), "http://proxy/etcd/v2/keys/ping");
    }

    #[test]
    fn error_codes_map_to_coordination_errors() {
        let not_found = r#"{"errorCode":100,"message":"Key not found","cause":"/ping","index":7}"#;
        assert_eq!(
            EtcdCoordinationHandler::decode_error("/ping", 404, not_found),
            CoordinationError::NotFound {
                key: "/ping".to_string()
            }
        );
        let cas = r#"{"errorCode":101,"message":"Compare failed","cause":"[a != b]","index":9}"#;
        assert!(matches!(
            EtcdCoordinationHandler::decode_error("/ping/a", 412, cas),
            CoordinationError::CompareFailed { .. }
        ));
        let cleared =
            r#"{"errorCode":401,"message":"The event in requested index is outdated and cleared","cause":"","index":2000}"#;
        assert_eq!(
            EtcdCoordinationHandler::decode_error("/result/x", 400, cleared),
            CoordinationError::IndexCleared { index: 2000 }
        );
        assert!(matches!(
            EtcdCoordinationHandler::decode_error("/x", 502, "bad gateway"),
            CoordinationError::Transport { .. }
        ));
    }

    #[test]
    fn directory_listing_decodes() {
        let body = r#"{"action":"get","node":{"key":"/ping","dir":true,"nodes":[
            {"key":"/ping/a","value":"2024-01-01T00:00:00Z","modifiedIndex":4,"createdIndex":4},
            {"key":"/ping/b","value":"2024-01-01T00:00:01Z","modifiedIndex":5,"createdIndex":5}
        ],"modifiedIndex":3,"createdIndex":3}}"#;
        let response = EtcdCoordinationHandler::parse(body).unwrap();
        assert!(response.node.dir);
        assert_eq!(response.node.nodes.len(), 2);
        assert_eq!(response.node.nodes[1].modified_index, 5);
    }

    #[test]
    fn actions_map_to_watch_actions() {
        assert_eq!(
            EtcdCoordinationHandler::action("compareAndSwap").unwrap(),
            WatchAction::CompareAndSwap
        );
        assert_eq!(
            EtcdCoordinationHandler::action("create").unwrap(),
            WatchAction::Set
        );
        assert!(EtcdCoordinationHandler::action("explode").is_err());
    }

    #[test]
    fn empty_endpoint_list_is_rejected() {
        let endpoints: Vec<String> = Vec::new();
        assert!(EtcdCoordinationHandler::new(endpoints, Duration::from_secs(1)).is_err());
    }
}
