//! Coordination store handlers

pub mod etcd;
pub mod memory;

pub use etcd::EtcdCoordinationHandler;
pub use memory::MemoryCoordinationHandler;
