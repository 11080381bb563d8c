//! Command execution on a member.
//!
//! The listener blocks on `/command/<host>` with no deadline. For each
//! command it loads the host's state slot, runs the consistency check or
//! apply over every entry, and publishes the results under the command id.
//! The index of each observed change is remembered so commands written
//! while a previous one was executing are picked up on the next watch.

use crate::client::{CommandEvent, OtterClient};
use crate::errors::ListenerError;
use crate::verb::Verb;
use otter_core::effects::{
    CancellationToken, CoordinationEffects, CoordinationError, PhysicalTimeEffects,
    RandomEffects, ReconcileEffects,
};
use otter_core::{OtterError, StateGraph, StateResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause before re-arming the watch after a transient store error.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// What a single listener step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerStep {
    /// A command was executed and its results published
    Executed {
        /// Verb as written in the key
        verb: String,
        /// Command id
        id: String,
        /// Number of results published
        results: usize,
    },
    /// A change that carries no command (deletion or expiry)
    Ignored {
        /// Key segment that changed
        verb: String,
    },
}

/// Command listener state machine
pub struct CommandListener<C, R, E, T> {
    client: Arc<OtterClient<C, R>>,
    effects: E,
    time: T,
    next_index: Option<u64>,
}

impl<C, R, E, T> CommandListener<C, R, E, T>
where
    C: CoordinationEffects,
    R: RandomEffects,
    E: ReconcileEffects,
    T: PhysicalTimeEffects,
{
    /// Create a listener that starts from the next change.
    pub fn new(client: Arc<OtterClient<C, R>>, effects: E, time: T) -> Self {
        Self {
            client,
            effects,
            time,
            next_index: None,
        }
    }

    /// Resume from a known store index instead of "now".
    pub fn starting_at(mut self, index: u64) -> Self {
        self.next_index = Some(index);
        self
    }

    /// Index the next watch resumes from.
    pub fn next_index(&self) -> Option<u64> {
        self.next_index
    }

    /// Wait for one command and handle it.
    pub async fn step(&mut self) -> Result<ListenerStep, ListenerError> {
        let event = match self.client.wait_for_command(self.next_index).await {
            Ok(event) => event,
            Err(CoordinationError::IndexCleared { index }) => {
                warn!(index, "command history cleared, resuming from now");
                self.next_index = None;
                return Err(CoordinationError::IndexCleared { index }.into());
            }
            Err(e) => return Err(e.into()),
        };
        self.next_index = Some(event.index + 1);
        self.handle(event).await
    }

    /// Execute a command event and publish its results.
    pub async fn handle(&self, event: CommandEvent) -> Result<ListenerStep, ListenerError> {
        let CommandEvent { verb, id, .. } = event;
        let Some(id) = id else {
            debug!(verb = %verb, "command key removed");
            return Ok(ListenerStep::Ignored { verb });
        };
        info!(verb = %verb, id = %id, "received command");

        let results = self.execute(&verb).await?;
        let count = results.len();
        self.client
            .save_results(&id, &results)
            .await
            .map_err(|e| match e {
                OtterError::Coordination(e) => ListenerError::Coordination(e),
                other => ListenerError::Publish {
                    id: id.clone(),
                    reason: other.to_string(),
                },
            })?;
        Ok(ListenerStep::Executed {
            verb,
            id,
            results: count,
        })
    }

    async fn execute(&self, verb: &str) -> Result<Vec<StateResult>, ListenerError> {
        let host = self.client.hostname();
        let verb: Verb = match verb.parse() {
            Ok(verb) => verb,
            Err(message) => {
                warn!(verb = %verb, "unknown command");
                return Ok(vec![StateResult::faulted(host, message)]);
            }
        };
        let graph = match self.load_state().await? {
            Some(graph) => graph,
            None => {
                warn!(host = %host, "command received before any state was submitted");
                return Ok(vec![StateResult::faulted(host, "No state loaded for host")]);
            }
        };
        let results = match verb {
            Verb::State => graph.check_all(&self.effects).await,
            Verb::Apply => graph.apply_all(&self.effects).await,
        };
        Ok(results
            .into_iter()
            .map(|result| result.with_host(host))
            .collect())
    }

    async fn load_state(&self) -> Result<Option<StateGraph>, ListenerError> {
        let Some(raw) = self.client.retrieve_state().await? else {
            return Ok(None);
        };
        StateGraph::from_json(&raw)
            .map(Some)
            .map_err(|e| ListenerError::MalformedState {
                host: self.client.hostname().to_string(),
                reason: e.to_string(),
            })
    }

    /// Handle commands until `shutdown` fires or a fatal error occurs.
    pub async fn run<S>(&mut self, shutdown: &S) -> Result<(), ListenerError>
    where
        S: CancellationToken + ?Sized,
    {
        info!(host = %self.client.hostname(), "listening for commands");
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                outcome = self.step() => outcome,
            };
            match outcome {
                Ok(step) => debug!(?step, "command handled"),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "command listener stopped");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "command listener error, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = self.time.sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}
