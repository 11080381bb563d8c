//! Heartbeat state machine driven step by step.

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]

use otter_core::effects::{CoordinationEffects, NeverCancel};
use otter_protocol::{
    keys, MembershipRegistrar, RegistrarConfig, RegistrarError, RegistrarState,
};
use otter_testkit::{ControllableClock, TestCluster, TestStore};
use std::time::Duration;

type Registrar = MembershipRegistrar<TestStore, otter_testkit::SeededRandom, ControllableClock>;

fn registrar(cluster: &TestCluster, host: &str, clock: &ControllableClock) -> Registrar {
    MembershipRegistrar::new(
        cluster.client(host),
        clock.clone(),
        RegistrarConfig::default(),
    )
}

#[tokio::test]
async fn first_heartbeat_registers_then_swaps() {
    let cluster = TestCluster::new();
    let clock = ControllableClock::default();
    let mut registrar = registrar(&cluster, "web-1", &clock);
    assert_eq!(registrar.state(), &RegistrarState::Unregistered);

    let first = registrar.step().await.unwrap();
    assert!(first.registered);
    assert_eq!(first.value, "2022-01-01T00:00:00.000Z");

    clock.advance(Duration::from_secs(15));
    let second = registrar.step().await.unwrap();
    assert!(!second.registered);
    assert_eq!(second.value, "2022-01-01T00:00:15.000Z");
    assert_eq!(
        registrar.state(),
        &RegistrarState::Registered {
            value: second.value.clone(),
            version: Some(2),
        }
    );

    let node = cluster.store().get(&keys::ping_key("web-1")).await.unwrap();
    assert_eq!(node.value, second.value);
}

#[tokio::test]
async fn overwritten_heartbeat_is_a_collision() {
    let cluster = TestCluster::new();
    let clock = ControllableClock::default();
    let mut ours = registrar(&cluster, "web-1", &clock);
    ours.step().await.unwrap();

    let other_clock = ControllableClock::new(1_700_000_000_000);
    let mut theirs = registrar(&cluster, "web-1", &other_clock);
    theirs.step().await.unwrap();

    clock.advance(Duration::from_secs(15));
    let err = ours.step().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, RegistrarError::IdentityCollision { .. }));
    assert_eq!(ours.state(), &RegistrarState::Collided);
    assert!(ours.step().await.is_err());
}

#[tokio::test]
async fn identical_rewrite_is_caught_by_the_version() {
    let cluster = TestCluster::new();
    let clock = ControllableClock::default();
    let mut ours = registrar(&cluster, "web-1", &clock);
    ours.step().await.unwrap();

    // Same clock reading, so the value matches and only the version gives
    // the intruder away.
    let mut theirs = registrar(&cluster, "web-1", &ControllableClock::default());
    theirs.step().await.unwrap();

    let err = ours.step().await.unwrap_err();
    match err {
        RegistrarError::IdentityCollision { reason, .. } => {
            assert!(reason.contains("version"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn expired_heartbeat_registers_again() {
    let cluster = TestCluster::new();
    let clock = ControllableClock::default();
    let mut registrar = registrar(&cluster, "web-1", &clock);
    registrar.step().await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    clock.advance(Duration::from_secs(61));
    let beat = registrar.step().await.unwrap();
    assert!(beat.registered);
    assert_eq!(beat.revision.version, Some(1));
}

#[tokio::test]
async fn clock_failure_is_not_fatal() {
    let cluster = TestCluster::new();
    let clock = ControllableClock::default();
    let mut registrar = registrar(&cluster, "web-1", &clock);

    clock.set_broken(true);
    let err = registrar.step().await.unwrap_err();
    assert!(matches!(err, RegistrarError::Clock(_)));
    assert!(!err.is_fatal());

    clock.set_broken(false);
    assert!(registrar.step().await.unwrap().registered);
}

#[tokio::test(start_paused = true)]
async fn run_heartbeats_every_interval() {
    let cluster = TestCluster::new();
    let clock = ControllableClock::default();
    let mut registrar = registrar(&cluster, "web-1", &clock);

    let task = tokio::spawn(async move { registrar.run(&NeverCancel).await });
    tokio::time::sleep(Duration::from_secs(46)).await;
    task.abort();

    assert_eq!(clock.sleeps().len(), 4);
    assert!(clock
        .sleeps()
        .iter()
        .all(|d| *d == Duration::from_secs(15)));
    let node = cluster.store().get(&keys::ping_key("web-1")).await.unwrap();
    assert_eq!(node.value, "2022-01-01T00:00:45.000Z");
}
