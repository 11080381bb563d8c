//! Control role: load a state file, hand it to members, run commands.

use crate::client::OtterClient;
use crate::dispatcher::{CommandDispatcher, DispatchConfig};
use crate::verb::Verb;
use otter_core::effects::{CoordinationEffects, RandomEffects};
use otter_core::state::load_from_path;
use otter_core::{Result, ResultMap, StateGraph};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Control process
pub struct Controller<C, R> {
    client: Arc<OtterClient<C, R>>,
    dispatcher: CommandDispatcher<C, R>,
}

impl<C, R> Controller<C, R>
where
    C: CoordinationEffects + 'static,
    R: RandomEffects + 'static,
{
    /// Create a controller over `client`.
    pub fn new(client: Arc<OtterClient<C, R>>, config: DispatchConfig) -> Self {
        let dispatcher = CommandDispatcher::new(Arc::clone(&client), config);
        Self { client, dispatcher }
    }

    /// Shared client.
    pub fn client(&self) -> &Arc<OtterClient<C, R>> {
        &self.client
    }

    /// Command fan-out.
    pub fn dispatcher(&self) -> &CommandDispatcher<C, R> {
        &self.dispatcher
    }

    /// Read and validate a declarative state file. A missing path falls back
    /// to `~/.otter`.
    pub fn load_graph(&self, path: impl AsRef<Path>) -> Result<StateGraph> {
        let graph = load_from_path(path)?;
        info!(entries = graph.len(), "loaded state");
        Ok(graph)
    }

    /// Live members, sorted.
    pub async fn list_hosts(&self) -> Result<Vec<String>> {
        Ok(self.client.list_hosts().await?)
    }

    /// Write `graph` to every live host matching `pattern`.
    pub async fn submit_state(&self, graph: &StateGraph, pattern: &str) -> Result<Vec<String>> {
        self.client.submit_state(graph, pattern).await
    }

    /// Run `verb` on every live host matching `pattern`.
    pub async fn submit_commands(&self, pattern: &str, verb: Verb) -> Result<ResultMap> {
        self.dispatcher.submit_commands(pattern, verb).await
    }

    /// Submit `graph`, then run `verb` on the hosts it was written to.
    pub async fn run(&self, graph: &StateGraph, pattern: &str, verb: Verb) -> Result<ResultMap> {
        let hosts = self.submit_state(graph, pattern).await?;
        Ok(self.dispatcher.dispatch(hosts, verb).await)
    }
}
