//! Command fan-out and result fan-in (control role).
//!
//! One task per target host writes the command and waits for its result.
//! Every task reports exactly once on a shared channel, converting any
//! failure into a Faulted result, and the collector performs exactly one
//! receive per task. An optional aggregate deadline bounds the whole call;
//! hosts still outstanding when it passes are reported as Faulted.

use crate::client::OtterClient;
use crate::verb::Verb;
use otter_core::effects::{CoordinationEffects, RandomEffects};
use otter_core::{Result, ResultMap, StateResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Fan-out timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How long each host gets to publish its result
    pub result_timeout: Duration,
    /// Bound on the whole fan-in; `None` waits for every host
    pub aggregate_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            result_timeout: Duration::from_secs(10),
            aggregate_timeout: None,
        }
    }
}

/// Command dispatcher
pub struct CommandDispatcher<C, R> {
    client: Arc<OtterClient<C, R>>,
    config: DispatchConfig,
}

impl<C, R> Clone for CommandDispatcher<C, R> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config,
        }
    }
}

impl<C, R> CommandDispatcher<C, R>
where
    C: CoordinationEffects + 'static,
    R: RandomEffects + 'static,
{
    /// Create a dispatcher over `client`.
    pub fn new(client: Arc<OtterClient<C, R>>, config: DispatchConfig) -> Self {
        Self { client, config }
    }

    /// Fan-out timing in use.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run `verb` on one host. Never fails: errors become one Faulted result.
    pub async fn submit_command(&self, host: &str, verb: Verb) -> Vec<StateResult> {
        match self.try_submit(host, verb).await {
            Ok(results) => results
                .into_iter()
                .map(|result| {
                    if result.host.is_empty() {
                        result.with_host(host)
                    } else {
                        result
                    }
                })
                .collect(),
            Err(e) => {
                warn!(host = %host, verb = %verb, error = %e, "command failed");
                vec![StateResult::faulted(host, e.to_string())]
            }
        }
    }

    async fn try_submit(&self, host: &str, verb: Verb) -> Result<Vec<StateResult>> {
        let issued = self.client.issue_command(host, verb.as_str()).await?;
        self.client
            .wait_for_results(
                &issued.id,
                Some(issued.revision.index + 1),
                self.config.result_timeout,
            )
            .await
    }

    /// Run `verb` on every live host matching `pattern` and gather results.
    pub async fn submit_commands(&self, pattern: &str, verb: Verb) -> Result<ResultMap> {
        let hosts = self.client.matching_hosts(pattern).await?;
        info!(verb = %verb, hosts = hosts.len(), "dispatching command");
        Ok(self.dispatch(hosts, verb).await)
    }

    /// Run `verb` on an explicit host list.
    pub async fn dispatch(&self, hosts: Vec<String>, verb: Verb) -> ResultMap {
        let mut results = ResultMap::new(self.client.hostname());
        if hosts.is_empty() {
            return results;
        }

        let (tx, mut rx) = mpsc::channel::<(String, Vec<StateResult>)>(hosts.len());
        for host in &hosts {
            let dispatcher = self.clone();
            let host = host.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = dispatcher.submit_command(&host, verb).await;
                // The collector may have given up already.
                let _ = tx.send((host, outcome)).await;
            });
        }
        drop(tx);

        let deadline = self
            .config
            .aggregate_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        let mut pending: BTreeSet<String> = hosts.iter().cloned().collect();

        for _ in 0..hosts.len() {
            let received = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        warn!(outstanding = pending.len(), "aggregate timeout reached");
                        break;
                    }
                },
                None => rx.recv().await,
            };
            let Some((host, outcome)) = received else {
                break;
            };
            debug!(host = %host, count = outcome.len(), "results received");
            pending.remove(&host);
            results.extend(outcome);
        }

        for host in pending {
            let message = if deadline.is_some() {
                "Timed out waiting for results (aggregate timeout)"
            } else {
                "Command task ended without reporting"
            };
            results.add(StateResult::faulted(host, message));
        }
        results
    }
}
