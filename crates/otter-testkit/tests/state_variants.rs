//! File and package entries reconciled against the mock system.

#![allow(clippy::unwrap_used, missing_docs)]

use otter_core::StateGraph;
use otter_testkit::{MockFile, MockSystem};
use serde_json::json;

fn graph(document: serde_json::Value) -> StateGraph {
    StateGraph::from_declarative(document).unwrap()
}

#[tokio::test]
async fn absent_file_is_removed() {
    let graph = graph(json!({ "/tmp/x": { "file.absent": {} } }));

    let clean = MockSystem::new();
    assert!(graph.check_all(&clean).await[0].consistent);

    let system = MockSystem::new().with_file("/tmp/x", "stale");
    let before = graph.check_all(&system).await;
    assert!(!before[0].consistent);
    assert_eq!(before[0].message, "File: /tmp/x exists");

    let applied = graph.apply_all(&system).await;
    assert!(applied[0].consistent);
    assert_eq!(system.file("/tmp/x"), None);
    assert_eq!(system.calls(), vec!["remove /tmp/x"]);
    assert!(graph.check_all(&system).await[0].consistent);
}

#[tokio::test]
async fn linked_file_creates_the_symlink() {
    let graph = graph(json!({
        "/usr/local/bin/docker": {
            "file.linked": { "source": "/opt/docker/bin/docker" }
        }
    }));
    let system = MockSystem::new();

    let before = graph.check_all(&system).await;
    assert!(!before[0].consistent);
    assert!(before[0].message.contains("is not a symlink"));

    let applied = graph.apply_all(&system).await;
    assert!(applied[0].consistent, "{}", applied[0].message);
    assert_eq!(
        system.file("/usr/local/bin/docker"),
        Some(MockFile::Link {
            target: "/opt/docker/bin/docker".into()
        })
    );
    assert_eq!(
        system.calls(),
        vec!["symlink /usr/local/bin/docker -> /opt/docker/bin/docker"]
    );

    // Already linked: apply leaves it alone.
    graph.apply_all(&system).await;
    assert_eq!(system.calls().len(), 1);
}

#[tokio::test]
async fn pinned_upstream_version_matches_debian_revision() {
    let graph = graph(json!({ "docker": { "package.installed": { "version": "1.9.1" } } }));

    let system = MockSystem::new().with_package("docker", Some("1.9.1-0~jessie"));
    let results = graph.apply_all(&system).await;
    assert!(results[0].consistent, "{}", results[0].message);
    assert!(system.calls().is_empty());

    let drifted = MockSystem::new().with_package("docker", Some("1.8.3-0~jessie"));
    let check = graph.check_all(&drifted).await;
    assert!(!check[0].consistent);
    assert!(check[0].message.contains("1.8.3-0~jessie"));
}
