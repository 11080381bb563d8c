//! Otter's view of the coordination store.
//!
//! `OtterClient` owns the key layout and payload encodings; the roles above
//! it (registrar, dispatcher, listener) only speak in hosts, graphs, verbs
//! and results.

use crate::keys;
use futures::future::try_join_all;
use otter_core::effects::{
    CoordinationEffects, CoordinationError, RandomEffects, Revision, SetOptions, WatchOptions,
};
use otter_core::{OtterError, Result, StateGraph, StateResult};
use std::time::Duration;
use tracing::{debug, info};

/// A command observed under `/command/<host>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    /// Trailing key segment (`state`, `apply`, or anything a caller wrote)
    pub verb: String,
    /// Command id the result must be published under; `None` when the
    /// command key was deleted or expired
    pub id: Option<String>,
    /// Store index of the write, for resuming the watch
    pub index: u64,
}

/// A command written for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCommand {
    /// Command id
    pub id: String,
    /// Store revision of the command write
    pub revision: Revision,
}

/// Coordination client bound to one host identity
pub struct OtterClient<C, R> {
    store: C,
    random: R,
    hostname: String,
}

impl<C, R> OtterClient<C, R>
where
    C: CoordinationEffects,
    R: RandomEffects,
{
    /// Create a client acting as `hostname`.
    pub fn new(store: C, random: R, hostname: impl Into<String>) -> Self {
        Self {
            store,
            random,
            hostname: hostname.into(),
        }
    }

    /// Host identity of this process.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Underlying store.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// Live members, sorted. No `/ping` directory means no members.
    pub async fn list_hosts(&self) -> std::result::Result<Vec<String>, CoordinationError> {
        let nodes = match self.store.list(keys::PING_DIR).await {
            Ok(nodes) => nodes,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut hosts: Vec<String> = nodes
            .iter()
            .map(|node| keys::last_segment(&node.key).to_string())
            .filter(|host| !host.is_empty())
            .collect();
        hosts.sort();
        hosts.dedup();
        Ok(hosts)
    }

    /// Live members whose name matches a glob `pattern` (`*` = all).
    pub async fn matching_hosts(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| OtterError::invalid(format!("Invalid host pattern {pattern}: {e}")))?;
        Ok(self
            .list_hosts()
            .await?
            .into_iter()
            .filter(|host| matcher.matches(host))
            .collect())
    }

    /// Write this host's heartbeat, conditioned on `previous` when given.
    pub async fn update_host(
        &self,
        value: &str,
        previous: Option<&str>,
        ttl: Duration,
    ) -> std::result::Result<Revision, CoordinationError> {
        let mut options = SetOptions::new().with_ttl(ttl);
        if let Some(previous) = previous {
            options = options.with_prev_value(previous);
        }
        self.store
            .set(&keys::ping_key(&self.hostname), value, options)
            .await
    }

    /// Write `graph` to the state slot of every live host matching
    /// `pattern`. Returns the hosts written.
    pub async fn submit_state(&self, graph: &StateGraph, pattern: &str) -> Result<Vec<String>> {
        let payload = graph.to_json()?;
        let hosts = self.matching_hosts(pattern).await?;
        try_join_all(hosts.iter().map(|host| {
            let key = keys::state_key(host);
            let payload = payload.as_str();
            async move {
                self.store.set(&key, payload, SetOptions::new()).await?;
                info!(host = %host, "updated state");
                Ok::<_, CoordinationError>(())
            }
        }))
        .await?;
        Ok(hosts)
    }

    /// Load this host's state slot. `None` when nothing was submitted yet.
    pub async fn retrieve_state(&self) -> std::result::Result<Option<String>, CoordinationError> {
        match self.store.get(&keys::state_key(&self.hostname)).await {
            Ok(node) => Ok(Some(node.value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Publish a result list under `/result/<id>`.
    pub async fn save_results(&self, id: &str, results: &[StateResult]) -> Result<Revision> {
        let payload = StateResult::list_to_json(results)?;
        let key = keys::result_key(id);
        let revision = self.store.set(&key, &payload, SetOptions::new()).await?;
        debug!(key = %key, count = results.len(), "saved results");
        Ok(revision)
    }

    /// Write a fresh command id under `/command/<host>/<verb>`.
    pub async fn issue_command(&self, host: &str, verb: &str) -> Result<IssuedCommand> {
        let id = keys::generate_nonce(&self.random).await;
        let key = keys::command_key(host, verb);
        let revision = self.store.set(&key, &id, SetOptions::new()).await?;
        debug!(key = %key, id = %id, "submitted command");
        Ok(IssuedCommand { id, revision })
    }

    /// Wait for the result list published under `id`.
    ///
    /// `wait_index` should be just past the command write so a result that
    /// lands before the watch is armed is still seen.
    pub async fn wait_for_results(
        &self,
        id: &str,
        wait_index: Option<u64>,
        timeout: Duration,
    ) -> Result<Vec<StateResult>> {
        let key = keys::result_key(id);
        let mut options = WatchOptions::new().with_timeout(timeout);
        if let Some(index) = wait_index {
            options = options.from_index(index);
        }
        debug!(key = %key, "waiting for results");
        let event = self.store.watch_once(&key, options).await?;
        let value = event.value.ok_or_else(|| {
            CoordinationError::decode(format!("{key} was removed before results arrived"))
        })?;
        StateResult::list_from_json(&value)
    }

    /// Wait for the next change under `/command/<this host>`.
    pub async fn wait_for_command(
        &self,
        wait_index: Option<u64>,
    ) -> std::result::Result<CommandEvent, CoordinationError> {
        let mut options = WatchOptions::new().recursive();
        if let Some(index) = wait_index {
            options = options.from_index(index);
        }
        let event = self
            .store
            .watch_once(&keys::command_dir(&self.hostname), options)
            .await?;
        let id = if event.action.is_write() {
            event.value
        } else {
            None
        };
        Ok(CommandEvent {
            verb: keys::last_segment(&event.key).to_string(),
            id,
            index: event.index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_effects::{MemoryCoordinationHandler, RealRandomHandler};

    fn client(host: &str) -> OtterClient<MemoryCoordinationHandler, RealRandomHandler> {
        OtterClient::new(MemoryCoordinationHandler::new(), RealRandomHandler::new(), host)
    }

    #[tokio::test]
    async fn no_ping_directory_means_no_hosts() {
        assert!(client("control").list_hosts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_state_slot_is_none() {
        assert_eq!(client("web-1").retrieve_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn result_timeout_is_reported() {
        let err = client("control")
            .wait_for_results("abcd1234", None, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OtterError::Coordination(CoordinationError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn deleted_commands_carry_no_id() {
        let member = client("web-1");
        let issued = member.issue_command("web-1", "state").await.unwrap();
        let event = member.wait_for_command(Some(1)).await.unwrap();
        assert_eq!(event.id.as_deref(), Some(issued.id.as_str()));
        assert_eq!(event.verb, "state");

        member
            .store()
            .delete(&keys::command_key("web-1", "state"))
            .await
            .unwrap();
        let event = member.wait_for_command(Some(event.index + 1)).await.unwrap();
        assert_eq!(event.id, None);
    }
}
