//! Shutdown joins over tracked operations.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use darcui_threading::{
    CancellationToken, ContextRegistry, MessageLoop, OperationError, ThreadRole, ThreadingError,
    TracingReporter,
};
use tokio::runtime::Handle;

use crate::common::{Harness, cancel_after};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_returns_once_the_last_operation_leaves() {
    let harness = Harness::start();
    let started = Instant::now();

    for delay_ms in [10_u64, 20, 30] {
        harness
            .registry
            .spawn_and_forget(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(delay_ms)
            })
            .unwrap();
    }

    let deadline = cancel_after(Duration::from_millis(100));
    harness
        .registry
        .join_pending_operations(&deadline)
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(30), "returned early: {elapsed:?}");
    assert!(!deadline.is_cancelled());
    assert!(harness.registry.current_factory().unwrap().tracked().is_empty());
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_with_nothing_pending_returns_immediately() {
    let harness = Harness::start();
    let token = CancellationToken::new();
    token.cancel();

    harness.registry.join_pending_operations(&token).await.unwrap();
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_wins_over_slow_operations() {
    let harness = Harness::start();
    let stop = CancellationToken::new();

    let worker_stop = stop.clone();
    let operation = harness
        .registry
        .spawn_and_forget(async move {
            worker_stop.cancelled().await;
            Err::<(), _>(OperationError::Canceled)
        })
        .unwrap();

    let deadline = cancel_after(Duration::from_millis(20));
    match harness.registry.join_pending_operations(&deadline).await {
        Err(ThreadingError::JoinCanceled { outstanding }) => {
            // The operation and its supervisor.
            assert_eq!(outstanding, 2);
        }
        other => panic!("expected JoinCanceled, got {other:?}"),
    }
    assert!(!operation.is_completed());

    // Left-behind work is still tracked and can be joined later.
    stop.cancel();
    harness.drain(Duration::from_secs(5)).await;
    assert!(operation.is_completed());
    assert!(harness.reports().is_empty());
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_waits_for_operations_added_while_waiting() {
    let harness = Harness::start();
    let registry = Arc::clone(&harness.registry);

    harness
        .registry
        .spawn_and_forget(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            registry
                .spawn_and_forget(async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(())
                })
                .map_err(anyhow::Error::from)?;
            Ok(())
        })
        .unwrap();

    let started = Instant::now();
    harness.drain(Duration::from_secs(5)).await;
    assert!(started.elapsed() >= Duration::from_millis(40));
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_requires_a_context() {
    let registry = ContextRegistry::new(Arc::new(TracingReporter), Handle::current());
    let result = registry
        .join_pending_operations(&CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ThreadingError::NoContext { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_refuses_to_run_on_the_ui_thread() {
    let registry = ContextRegistry::new(Arc::new(TracingReporter), Handle::current());
    // Bind the context to this thread so the join is attempted "on main".
    let (_message_loop, context) = MessageLoop::for_current_thread();
    registry.install(Some(context));

    let result = registry
        .join_pending_operations(&CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(ThreadingError::AffinityViolation {
            expected: ThreadRole::Background,
            ..
        })
    ));
}
