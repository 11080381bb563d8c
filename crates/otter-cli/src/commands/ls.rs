//! `otter ls`

use super::Context;
use anyhow::Result;

/// Print the live hosts.
pub async fn run(context: &Context) -> Result<bool> {
    let hosts = context.controller()?.list_hosts().await?;
    println!("{}", crate::render::hosts(&hosts, context.json)?);
    Ok(true)
}
