//! Command listener driven one watch at a time.

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]

use otter_core::effects::{CoordinationEffects, CoordinationError, SetOptions};
use otter_core::StateResult;
use otter_effects::MemoryCoordinationHandler;
use otter_protocol::{keys, CommandListener, ListenerError, ListenerStep, OtterClient};
use otter_testkit::{fixtures, ControllableClock, MockSystem, SeededRandom, TestCluster};
use std::sync::Arc;

fn listener(
    client: Arc<OtterClient<MemoryCoordinationHandler, SeededRandom>>,
    system: MockSystem,
) -> CommandListener<MemoryCoordinationHandler, SeededRandom, MockSystem, ControllableClock> {
    CommandListener::new(client, system, ControllableClock::default()).starting_at(1)
}

async fn published(store: &MemoryCoordinationHandler, id: &str) -> Vec<StateResult> {
    let node = store.get(&keys::result_key(id)).await.unwrap();
    StateResult::list_from_json(&node.value).unwrap()
}

#[tokio::test]
async fn apply_runs_every_entry_and_publishes() {
    let cluster = TestCluster::new();
    let member = cluster.client("web-1");
    let control = cluster.client("control");
    let system = fixtures::bare_web_host();
    let mut listener = listener(Arc::clone(&member), system.clone());

    cluster
        .store()
        .set(
            &keys::state_key("web-1"),
            &fixtures::web_graph().to_json().unwrap(),
            SetOptions::new(),
        )
        .await
        .unwrap();
    let issued = control.issue_command("web-1", "apply").await.unwrap();

    let step = listener.step().await.unwrap();
    assert_eq!(
        step,
        ListenerStep::Executed {
            verb: "apply".into(),
            id: issued.id.clone(),
            results: 3,
        }
    );
    assert_eq!(listener.next_index(), Some(issued.revision.index + 1));

    let results = published(cluster.store(), &issued.id).await;
    assert!(results.iter().all(|r| r.consistent && r.host == "web-1"));
    let mut calls = system.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            "install nginx",
            "start nginx",
            "write /etc/nginx/nginx.conf 644",
        ]
    );
}

#[tokio::test]
async fn commands_queued_while_busy_are_not_lost() {
    let cluster = TestCluster::new();
    let control = cluster.client("control");
    let mut listener = listener(cluster.client("web-1"), fixtures::converged_web_host());
    cluster
        .store()
        .set(
            &keys::state_key("web-1"),
            &fixtures::web_graph().to_json().unwrap(),
            SetOptions::new(),
        )
        .await
        .unwrap();

    let first = control.issue_command("web-1", "state").await.unwrap();
    let second = control.issue_command("web-1", "apply").await.unwrap();

    for expected in [&first, &second] {
        match listener.step().await.unwrap() {
            ListenerStep::Executed { id, .. } => assert_eq!(id, expected.id),
            other => panic!("unexpected step: {other:?}"),
        }
    }
    assert_eq!(published(cluster.store(), &second.id).await.len(), 3);
}

#[tokio::test]
async fn removed_command_keys_are_ignored() {
    let cluster = TestCluster::new();
    let control = cluster.client("control");
    let mut listener = listener(cluster.client("web-1"), MockSystem::new());

    let issued = control.issue_command("web-1", "state").await.unwrap();
    listener.step().await.unwrap();
    cluster
        .store()
        .delete(&keys::command_key("web-1", "state"))
        .await
        .unwrap();

    let step = listener.step().await.unwrap();
    assert_eq!(
        step,
        ListenerStep::Ignored {
            verb: "state".into()
        }
    );
    let faulted = published(cluster.store(), &issued.id).await;
    assert_eq!(faulted[0].message, "No state loaded for host");
}

#[tokio::test]
async fn malformed_state_is_fatal() {
    let cluster = TestCluster::new();
    let control = cluster.client("control");
    let mut listener = listener(cluster.client("web-1"), MockSystem::new());
    cluster
        .store()
        .set(&keys::state_key("web-1"), "{not json", SetOptions::new())
        .await
        .unwrap();
    control.issue_command("web-1", "state").await.unwrap();

    let err = listener.step().await.unwrap_err();
    assert!(matches!(err, ListenerError::MalformedState { ref host, .. } if host == "web-1"));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn cleared_history_resumes_from_now() {
    let store = MemoryCoordinationHandler::with_history(2);
    for n in 0..5 {
        store
            .set(&format!("/noise/{n}"), "x", SetOptions::new())
            .await
            .unwrap();
    }
    let client = Arc::new(OtterClient::new(store, SeededRandom::default(), "web-1"));
    let mut listener = listener(client, MockSystem::new());

    let err = listener.step().await.unwrap_err();
    assert!(matches!(
        err,
        ListenerError::Coordination(CoordinationError::IndexCleared { .. })
    ));
    assert!(!err.is_fatal());
    assert_eq!(listener.next_index(), None);
}
