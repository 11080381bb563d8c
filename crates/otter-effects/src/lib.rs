//! Otter Effects - production effect handlers
//!
//! Implementations of the effect traits declared in `otter-core`:
//!
//! - coordination: `EtcdCoordinationHandler` (etcd v2 over HTTP) and
//!   `MemoryCoordinationHandler` (single process)
//! - OS capabilities: filesystem, source retrieval, dpkg/apt, systemd,
//!   bundled as `SystemHandler`
//! - `RealTimeHandler`, `RealRandomHandler`, and shutdown tokens
//!
//! Test doubles live in `otter-testkit`.

#![forbid(unsafe_code)]

pub mod coordination;
pub mod identity;
pub mod random;
pub mod system;
pub mod task;
pub mod time;

pub use coordination::{EtcdCoordinationHandler, MemoryCoordinationHandler};
pub use identity::resolve_hostname;
pub use random::RealRandomHandler;
pub use system::{
    Distro, DpkgPackageHandler, RealFilesystemHandler, SourceRetrievalHandler,
    SystemHandler, SystemdServiceHandler, UnsupportedHandler,
};
pub use task::{ShutdownHandle, ShutdownToken};
pub use time::RealTimeHandler;
