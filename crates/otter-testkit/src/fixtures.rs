//! State graph fixtures shared across crates.

use crate::mock_system::MockSystem;
use otter_core::state::load_from_str;
use otter_core::StateGraph;

/// Source the web fixture renders its config from.
pub const WEB_CONFIG_SOURCE: &str = "http://config.example.com/nginx.conf";
/// Rendered config contents.
pub const WEB_CONFIG: &str = "worker_processes 4;\n";

/// A file, a package that requires it, and a service.
pub const WEB_STATE: &str = r#"
/etc/nginx/nginx.conf:
  file.rendered:
    mode: 644
    source: http://config.example.com/nginx.conf
nginx:
  package.installed:
    version: 1.18.0
    require:
      - /etc/nginx/nginx.conf
  service.running:
    running: true
"#;

/// Requirement on an entry that is never declared.
pub const MISSING_REQUIREMENT_STATE: &str = r#"
mesos:
  package.installed:
    require:
      - zookeeper
"#;

/// Parsed [`WEB_STATE`].
pub fn web_graph() -> StateGraph {
    load_from_str(WEB_STATE).expect("web fixture is valid")
}

/// A host that has never seen the web state: only the source is reachable.
pub fn bare_web_host() -> MockSystem {
    MockSystem::new().with_source(WEB_CONFIG_SOURCE, WEB_CONFIG)
}

/// A host already matching [`WEB_STATE`].
pub fn converged_web_host() -> MockSystem {
    bare_web_host()
        .with_file("/etc/nginx/nginx.conf", WEB_CONFIG)
        .with_package("nginx", Some("1.18.0"))
        .with_service("nginx", true)
}
