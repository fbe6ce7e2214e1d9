//! End-to-end scenarios from spec §8, driven against in-process TCP
//! peers (SPEC_FULL §10.5). No mocked transport — every test opens a
//! real loopback socket.

mod common;

use std::time::Duration;

use nodepool_core::{NodeBuilder, NodeError, NodeState};

use common::{spawn_echo_server, spawn_hangup_server, spawn_silent_server, TestOperation};

#[tokio::test]
async fn happy_path_round_trips_through_the_idle_pool() {
    let addr = spawn_echo_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(1)
            .with_max_connections(2)
            .build_config()
            .unwrap(),
    )
    .unwrap();

    node.start().await.unwrap();
    assert_eq!(node.stats().idle_count, 1);
    assert_eq!(node.stats().available_permits, 2);

    let op = TestOperation::new(b"ping".to_vec());
    assert!(node.execute(op.clone()).await.unwrap());
    assert_eq!(node.stats().available_permits, 1);

    op.wait_done().await;
    assert_eq!(op.response().unwrap(), b"ping");
    assert_eq!(node.stats().available_permits, 2);
    assert_eq!(node.stats().in_flight_count, 0);
}

#[tokio::test]
async fn fail_fast_saturation_returns_false_and_leaks_no_permit() {
    let addr = spawn_echo_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(0)
            .with_max_connections(1)
            .with_block_on_max_connections(false)
            .build_config()
            .unwrap(),
    )
    .unwrap();
    node.start().await.unwrap();

    let op1 = TestOperation::new(b"one".to_vec());
    assert!(node.execute(op1.clone()).await.unwrap());
    assert_eq!(node.stats().available_permits, 0);

    let op2 = TestOperation::new(b"two".to_vec());
    assert!(!node.execute(op2).await.unwrap());
    assert_eq!(node.stats().available_permits, 0);

    op1.wait_done().await;
    assert_eq!(op1.response().unwrap(), b"one");
}

#[tokio::test]
async fn blocking_saturation_serves_waiters_fifo() {
    let addr = spawn_echo_server().await;
    let node = std::sync::Arc::new(
        nodepool_core::Node::new(
            NodeBuilder::new()
                .with_remote_address(addr.ip().to_string())
                .with_remote_port(addr.port())
                .with_min_connections(0)
                .with_max_connections(1)
                .with_block_on_max_connections(true)
                .build_config()
                .unwrap(),
        )
        .unwrap(),
    );
    node.start().await.unwrap();

    let op1 = TestOperation::new(b"one".to_vec());
    assert!(node.execute(op1.clone()).await.unwrap());

    let node2 = node.clone();
    let op2 = TestOperation::new(b"two".to_vec());
    let op2_for_task = op2.clone();
    let waiter = tokio::spawn(async move { node2.execute(op2_for_task).await.unwrap() });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    op1.wait_done().await;
    assert_eq!(op1.response().unwrap(), b"one");

    assert!(waiter.await.unwrap());
    op2.wait_done().await;
    assert_eq!(op2.response().unwrap(), b"two");
}

// Real time, not `start_paused`: idle-since timestamps are taken with
// `std::time::Instant` (idle_pool.rs), which tokio's virtual clock does
// not advance, so this test has to wait out a real reaper tick.
#[tokio::test]
async fn idle_reap_trims_down_to_the_floor() {
    let addr = spawn_echo_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(1)
            .with_max_connections(5)
            .with_idle_timeout_millis(50)
            .build_config()
            .unwrap(),
    )
    .unwrap();
    node.start().await.unwrap();

    // Drive four more connections into the idle pool alongside the one
    // opened at start.
    let mut ops = Vec::new();
    for i in 0..4u8 {
        let op = TestOperation::new(vec![i]);
        assert!(node.execute(op.clone()).await.unwrap());
        ops.push(op);
    }
    for op in &ops {
        op.wait_done().await;
    }
    assert_eq!(node.stats().idle_count, 5);

    // One reaper tick past the idle timeout: reap_once runs on a fixed
    // 5s delay after a 1s initial delay, so wait out both.
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert_eq!(node.stats().idle_count, 1);
    assert!(node.stats().reap_count >= 4);
}

#[tokio::test]
async fn health_monitor_demotes_and_recovers() {
    let (addr, held) = spawn_silent_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(0)
            .with_max_connections(10)
            .build_config()
            .unwrap(),
    )
    .unwrap();
    node.start().await.unwrap();

    // Six disconnects within the 3s window: open and immediately drop
    // six connections from the server side.
    for _ in 0..6 {
        let op = TestOperation::new(b"x".to_vec());
        assert!(node.execute(op.clone()).await.unwrap());
        // The silent server never replies; dropping its side of the
        // socket is what resolves this operation, via an unexpected
        // close rather than a response.
        held.lock().unwrap().clear();
        op.wait_done().await;
    }

    // Wait for a health tick (500ms cadence after a 1s initial delay) to
    // see the demotion.
    tokio::time::sleep(Duration::from_millis(1700)).await;
    assert_eq!(node.state(), NodeState::HealthChecking);

    // The probe's next attempt succeeds once the server accepts again.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(node.state(), NodeState::Running);
}

#[tokio::test]
async fn mid_operation_close_surfaces_unexpected_close() {
    let (addr, held) = spawn_silent_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(0)
            .with_max_connections(2)
            .build_config()
            .unwrap(),
    )
    .unwrap();
    node.start().await.unwrap();

    let op = TestOperation::new(b"ping".to_vec());
    assert!(node.execute(op.clone()).await.unwrap());

    // Give the write a moment to land, then close the connection from
    // the server side before any response is sent.
    tokio::time::sleep(Duration::from_millis(20)).await;
    held.lock().unwrap().clear();

    op.wait_done().await;
    assert!(matches!(op.error(), Some(NodeError::UnexpectedClose(_))));
    assert_eq!(node.stats().available_permits, 2);
}

#[tokio::test]
async fn execute_before_start_is_illegal_state() {
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address("127.0.0.1")
            .with_remote_port(1)
            .build_config()
            .unwrap(),
    )
    .unwrap();

    let op = TestOperation::new(b"x".to_vec());
    let result = node.execute(op).await;
    assert!(matches!(result, Err(NodeError::IllegalState(_))));
}

#[tokio::test]
async fn double_start_is_illegal_state() {
    let addr = spawn_echo_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(0)
            .build_config()
            .unwrap(),
    )
    .unwrap();

    node.start().await.unwrap();
    let result = node.start().await;
    assert!(matches!(result, Err(NodeError::IllegalState(_))));
}

#[tokio::test]
async fn shutdown_drains_in_flight_before_completing() {
    let addr = spawn_echo_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(0)
            .with_max_connections(1)
            .build_config()
            .unwrap(),
    )
    .unwrap();
    node.start().await.unwrap();

    let op = TestOperation::new(b"ping".to_vec());
    assert!(node.execute(op.clone()).await.unwrap());

    let handle = node.shutdown().await.unwrap();
    assert_eq!(node.state(), NodeState::ShuttingDown);

    op.wait_done().await;
    assert!(handle.wait_timeout(Duration::from_secs(2)).await);
    assert_eq!(node.state(), NodeState::Shutdown);
}

#[tokio::test]
async fn repeated_shutdown_is_illegal_state() {
    let addr = spawn_echo_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(0)
            .build_config()
            .unwrap(),
    )
    .unwrap();
    node.start().await.unwrap();

    let handle = node.shutdown().await.unwrap();
    handle.wait_timeout(Duration::from_secs(2)).await;

    let result = node.shutdown().await;
    assert!(matches!(result, Err(NodeError::IllegalState(_))));
}

#[tokio::test]
async fn idle_close_is_recorded_without_disrupting_the_pool() {
    let addr = spawn_hangup_server().await;
    let node = nodepool_core::Node::new(
        NodeBuilder::new()
            .with_remote_address(addr.ip().to_string())
            .with_remote_port(addr.port())
            .with_min_connections(1)
            .build_config()
            .unwrap(),
    )
    .unwrap();

    // The hangup server closes every connection right after accept, so
    // start()'s pre-opened connection will show up closed in the idle
    // pool rather than being evicted eagerly (spec §4.6).
    node.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(node.stats().idle_count, 1);

    // getConnection's drain-and-discard step (or the reaper) is what
    // actually removes it; a fresh execute forces that path and falls
    // through to opening a new connection, which the hangup server also
    // closes immediately, so the operation fails rather than hanging.
    let op = TestOperation::new(b"x".to_vec());
    node.execute(op.clone()).await.ok();
    tokio::time::sleep(Duration::from_millis(50)).await;
}
