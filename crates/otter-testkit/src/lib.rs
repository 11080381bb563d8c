//! Otter Testing Infrastructure
//!
//! Deterministic doubles for every effect trait, shared state fixtures, and
//! an in-process cluster harness.
//!
//! Add this to a crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! otter-testkit = { path = "../otter-testkit" }
//! ```
//!
//! ```rust,no_run
//! use otter_testkit::{fixtures, TestCluster};
//! use otter_protocol::{DispatchConfig, Verb};
//!
//! # async fn demo() {
//! let cluster = TestCluster::new();
//! let member = cluster.start_member("web-1", fixtures::bare_web_host()).await;
//! let controller = cluster.controller(DispatchConfig::default());
//! let results = controller.run(&fixtures::web_graph(), "*", Verb::Apply).await.unwrap();
//! assert!(results.is_consistent());
//! member.stop().await.unwrap();
//! # }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod cluster;
pub mod fixtures;
pub mod mock_system;
pub mod random;
pub mod time;

pub use cluster::{Member, TestClient, TestCluster, TestStore, CONTROL_HOST};
pub use mock_system::{MockFile, MockSystem};
pub use random::SeededRandom;
pub use time::ControllableClock;
