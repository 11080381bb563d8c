//! Subcommand handlers
//!
//! Each handler returns whether everything it reported was consistent; the
//! binary turns that into the exit status.

pub mod daemon;
pub mod load;
pub mod ls;
pub mod run;

use anyhow::Result;
use otter_core::OtterConfig;
use otter_effects::{resolve_hostname, EtcdCoordinationHandler, RealRandomHandler};
use otter_protocol::{Controller, DispatchConfig, OtterClient, RegistrarConfig};
use std::sync::Arc;

/// Client type every command talks to the store through.
pub type StoreClient = OtterClient<EtcdCoordinationHandler, RealRandomHandler>;

/// Shared inputs for every subcommand.
pub struct Context {
    pub config: OtterConfig,
    pub hostname: String,
    pub json: bool,
}

impl Context {
    pub fn new(config: OtterConfig, json: bool) -> Result<Self> {
        let hostname = resolve_hostname(config.hostname.as_deref())?;
        Ok(Self {
            config,
            hostname,
            json,
        })
    }

    pub fn client(&self) -> Result<Arc<StoreClient>> {
        let store =
            EtcdCoordinationHandler::new(&self.config.endpoints, self.config.request_timeout())?;
        Ok(Arc::new(OtterClient::new(
            store,
            RealRandomHandler::new(),
            self.hostname.clone(),
        )))
    }

    pub fn controller(&self) -> Result<Controller<EtcdCoordinationHandler, RealRandomHandler>> {
        Ok(Controller::new(self.client()?, self.dispatch_config()))
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            result_timeout: self.config.result_timeout(),
            aggregate_timeout: self.config.aggregate_timeout(),
        }
    }

    pub fn registrar_config(&self) -> RegistrarConfig {
        RegistrarConfig {
            interval: self.config.heartbeat_interval(),
            ttl: self.config.heartbeat_ttl(),
        }
    }
}
