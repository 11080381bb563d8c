//! Otter Protocol - coordination roles
//!
//! Everything that talks to the coordination store lives here, expressed
//! over the effect traits in `otter-core`:
//!
//! - `OtterClient`: key layout and payload encodings
//! - `MembershipRegistrar`: compare-and-swap heartbeats with collision detection
//! - `CommandListener`: executes commands against the host's state slot
//! - `CommandDispatcher`: fans a command out and gathers every host's result
//! - `Daemon` and `Controller`: the member and control processes

#![forbid(unsafe_code)]

pub mod client;
pub mod controller;
pub mod daemon;
pub mod dispatcher;
pub mod errors;
pub mod keys;
pub mod listener;
pub mod registrar;
pub mod verb;

pub use client::{CommandEvent, IssuedCommand, OtterClient};
pub use controller::Controller;
pub use daemon::Daemon;
pub use dispatcher::{CommandDispatcher, DispatchConfig};
pub use errors::{DaemonError, ListenerError, RegistrarError};
pub use listener::{CommandListener, ListenerStep, RETRY_DELAY};
pub use registrar::{
    heartbeat_value, Heartbeat, MembershipRegistrar, RegistrarConfig, RegistrarState,
};
pub use verb::Verb;
