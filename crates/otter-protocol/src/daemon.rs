//! Member process: heartbeat and command loops run side by side.
//!
//! Whichever loop stops first ends the daemon. A fatal error from either
//! loop is returned; a requested shutdown returns `Ok`.

use crate::client::OtterClient;
use crate::errors::DaemonError;
use crate::listener::CommandListener;
use crate::registrar::{MembershipRegistrar, RegistrarConfig};
use otter_core::effects::{
    CancellationToken, CoordinationEffects, PhysicalTimeEffects, RandomEffects, ReconcileEffects,
};
use std::sync::Arc;
use tracing::info;

/// Member process
pub struct Daemon<C, R, E, T> {
    registrar: MembershipRegistrar<C, R, T>,
    listener: CommandListener<C, R, E, T>,
}

impl<C, R, E, T> Daemon<C, R, E, T>
where
    C: CoordinationEffects,
    R: RandomEffects,
    E: ReconcileEffects,
    T: PhysicalTimeEffects + Clone,
{
    /// Build both loops over a shared client.
    pub fn new(
        client: Arc<OtterClient<C, R>>,
        effects: E,
        time: T,
        config: RegistrarConfig,
    ) -> Self {
        Self {
            registrar: MembershipRegistrar::new(Arc::clone(&client), time.clone(), config),
            listener: CommandListener::new(client, effects, time),
        }
    }

    /// Assemble from loops built elsewhere.
    pub fn from_parts(
        registrar: MembershipRegistrar<C, R, T>,
        listener: CommandListener<C, R, E, T>,
    ) -> Self {
        Self {
            registrar,
            listener,
        }
    }

    /// Heartbeat loop.
    pub fn registrar(&self) -> &MembershipRegistrar<C, R, T> {
        &self.registrar
    }

    /// Command loop.
    pub fn listener(&self) -> &CommandListener<C, R, E, T> {
        &self.listener
    }

    /// Run until `shutdown` fires or either loop fails.
    pub async fn run<S>(&mut self, shutdown: &S) -> Result<(), DaemonError>
    where
        S: CancellationToken + ?Sized,
    {
        let Self {
            registrar,
            listener,
        } = self;
        let outcome = tokio::select! {
            result = registrar.run(shutdown) => result.map_err(DaemonError::from),
            result = listener.run(shutdown) => result.map_err(DaemonError::from),
        };
        if outcome.is_ok() {
            info!("member stopped");
        }
        outcome
    }
}
