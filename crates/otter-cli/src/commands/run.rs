//! `otter state` and `otter apply`

use super::Context;
use anyhow::Result;
use clap::Args;
use otter_core::effects::ReconcileEffects;
use otter_core::state::load_from_path;
use otter_core::{ResultMap, StateGraph};
use otter_effects::SystemHandler;
use otter_protocol::Verb;

/// Target selection for a command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Run against this machine only, without the coordination store
    #[arg(long)]
    pub local: bool,

    /// Glob over live host names
    #[arg(long, default_value = "*")]
    pub hosts: String,
}

/// Submit state, run `verb`, print the results.
pub async fn run(context: &Context, args: &RunArgs, verb: Verb) -> Result<bool> {
    let results = if args.local {
        let graph = load_from_path(&context.config.state_path)?;
        run_local(&graph, &SystemHandler::detect(), &context.hostname, verb).await
    } else {
        let controller = context.controller()?;
        let graph = controller.load_graph(&context.config.state_path)?;
        controller.run(&graph, &args.hosts, verb).await?
    };
    println!("{}", crate::render::results(&results, context.json)?);
    Ok(results.is_consistent())
}

/// Run `verb` over `graph` on this machine.
pub async fn run_local<E>(graph: &StateGraph, effects: &E, hostname: &str, verb: Verb) -> ResultMap
where
    E: ReconcileEffects + ?Sized,
{
    let outcome = match verb {
        Verb::State => graph.check_all(effects).await,
        Verb::Apply => graph.apply_all(effects).await,
    };
    let mut results = ResultMap::new(hostname);
    results.extend(outcome);
    results
}
