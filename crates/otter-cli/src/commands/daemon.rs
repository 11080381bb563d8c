//! `otter daemon`

use super::Context;
use anyhow::Result;
use otter_effects::{RealTimeHandler, ShutdownHandle, SystemHandler};
use otter_protocol::Daemon;
use tracing::{info, warn};

/// Run the member role until ctrl-c or a fatal error.
pub async fn run(context: &Context) -> Result<bool> {
    let client = context.client()?;
    let mut daemon = Daemon::new(
        client,
        SystemHandler::detect(),
        RealTimeHandler::new(),
        context.registrar_config(),
    );

    let shutdown = ShutdownHandle::new();
    let token = shutdown.token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => warn!(error = %e, "unable to listen for interrupts, shutting down"),
        }
        shutdown.shutdown();
    });

    info!(host = %context.hostname, "starting member");
    daemon.run(&token).await?;
    Ok(true)
}
