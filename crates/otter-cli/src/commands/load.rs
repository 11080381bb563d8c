//! `otter load`

use super::Context;
use anyhow::Result;
use tracing::info;

/// Submit the state file to every live host.
pub async fn run(context: &Context) -> Result<bool> {
    let controller = context.controller()?;
    let graph = controller.load_graph(&context.config.state_path)?;
    let hosts = controller.submit_state(&graph, "*").await?;
    if hosts.is_empty() {
        info!("no live hosts");
    }
    println!("{}", crate::render::hosts(&hosts, context.json)?);
    Ok(true)
}
