//! In-process cluster harness
//!
//! A `TestCluster` is one shared in-memory coordination store. Members are
//! full daemons (heartbeat plus command listener) running on spawned tasks
//! over a `MockSystem`; the controller is an ordinary `Controller` bound to
//! the same store.

use crate::mock_system::MockSystem;
use crate::random::SeededRandom;
use crate::time::{ControllableClock, DEFAULT_START_MS};
use otter_core::effects::{CoordinationEffects, PhysicalTime};
use otter_effects::{MemoryCoordinationHandler, ShutdownHandle};
use otter_protocol::{
    heartbeat_value, keys, CommandListener, Controller, Daemon, DaemonError, DispatchConfig,
    MembershipRegistrar, OtterClient, RegistrarConfig,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Store type every cluster participant shares.
pub type TestStore = MemoryCoordinationHandler;
/// Client type every cluster participant uses.
pub type TestClient = OtterClient<TestStore, SeededRandom>;

/// Host name the cluster's controller acts as.
pub const CONTROL_HOST: &str = "control";

/// A running member daemon.
pub struct Member {
    hostname: String,
    system: MockSystem,
    shutdown: ShutdownHandle,
    task: JoinHandle<Result<(), DaemonError>>,
}

impl Member {
    /// Host name the member heartbeats as.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The member's OS capabilities.
    pub fn system(&self) -> &MockSystem {
        &self.system
    }

    /// True once the daemon has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the daemon to stop on its own.
    pub async fn join(self) -> Result<(), DaemonError> {
        self.task.await.expect("member task panicked")
    }

    /// Request shutdown and wait for the daemon to return.
    pub async fn stop(self) -> Result<(), DaemonError> {
        self.shutdown.shutdown();
        self.join().await
    }
}

/// Shared store plus helpers to populate it with members.
pub struct TestCluster {
    store: TestStore,
    registrar: RegistrarConfig,
    seed: AtomicU64,
}

impl TestCluster {
    /// Empty cluster with default heartbeat timing.
    pub fn new() -> Self {
        Self {
            store: TestStore::new(),
            registrar: RegistrarConfig::default(),
            seed: AtomicU64::new(1),
        }
    }

    /// Override heartbeat timing for members started afterwards.
    pub fn with_registrar_config(mut self, config: RegistrarConfig) -> Self {
        self.registrar = config;
        self
    }

    /// The shared store.
    pub fn store(&self) -> &TestStore {
        &self.store
    }

    /// A client acting as `hostname`, with its own seeded id generator.
    pub fn client(&self, hostname: &str) -> Arc<TestClient> {
        let seed = self.seed.fetch_add(1, Ordering::Relaxed);
        Arc::new(OtterClient::new(
            self.store.clone(),
            SeededRandom::new(seed),
            hostname,
        ))
    }

    /// Controller bound to the shared store.
    pub fn controller(&self, config: DispatchConfig) -> Controller<TestStore, SeededRandom> {
        Controller::new(self.client(CONTROL_HOST), config)
    }

    /// Start a member daemon and wait until its first heartbeat lands.
    pub async fn start_member(&self, hostname: &str, system: MockSystem) -> Member {
        let client = self.client(hostname);
        let clock = ControllableClock::default();
        // Arm the listener before anyone can address this host.
        let start = self.store.current_index().await + 1;
        let registrar = MembershipRegistrar::new(Arc::clone(&client), clock.clone(), self.registrar);
        let listener = CommandListener::new(client, system.clone(), clock).starting_at(start);
        let mut daemon = Daemon::from_parts(registrar, listener);

        let shutdown = ShutdownHandle::new();
        let token = shutdown.token();
        let task = tokio::spawn(async move { daemon.run(&token).await });
        self.wait_for_host(hostname).await;

        Member {
            hostname: hostname.to_string(),
            system,
            shutdown,
            task,
        }
    }

    /// Register `hostname` as live without anything listening for its
    /// commands.
    pub async fn register_unresponsive(&self, hostname: &str) {
        let value = heartbeat_value(PhysicalTime::from_millis(DEFAULT_START_MS));
        self.client(hostname)
            .update_host(&value, None, self.registrar.ttl)
            .await
            .expect("heartbeat write");
    }

    /// Poll until `/ping/<hostname>` exists.
    pub async fn wait_for_host(&self, hostname: &str) {
        let key = keys::ping_key(hostname);
        for _ in 0..500 {
            if self.store.get(&key).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{hostname} never registered");
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}
