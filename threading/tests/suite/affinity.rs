//! Affinity checks against a live UI thread.

use std::sync::Arc;

use darcui_threading::{ThreadRole, ThreadingError};

use crate::common::Harness;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn on_main_passes_inside_ui_callbacks() {
    let harness = Harness::start();
    let registry = Arc::clone(&harness.registry);

    let result = harness
        .context
        .invoke(move || {
            registry.debug_assert_on_main();
            registry.assert_on_main("Form1_Load")
        })
        .await
        .unwrap();
    assert!(result.is_ok());
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn on_main_from_a_worker_names_the_caller() {
    let harness = Harness::start();
    let registry = Arc::clone(&harness.registry);

    let result = tokio::spawn(async move { registry.assert_on_main("update_status_bar") })
        .await
        .unwrap();
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        ThreadingError::AffinityViolation { expected: ThreadRole::Main, .. }
    ));
    assert_eq!(err.to_string(), "update_status_bar must be called on the UI thread");
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn off_main_fails_inside_ui_callbacks() {
    let harness = Harness::start();
    let registry = Arc::clone(&harness.registry);

    let result = harness
        .context
        .invoke(move || registry.assert_off_main("query_channels"))
        .await
        .unwrap();
    assert!(matches!(
        result,
        Err(ThreadingError::AffinityViolation { expected: ThreadRole::Background, .. })
    ));
    assert!(harness.registry.assert_off_main("query_channels").is_ok());
    harness.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clearing_the_context_breaks_on_main_on_the_same_thread() {
    let harness = Harness::start();

    let registry = Arc::clone(&harness.registry);
    let before = harness
        .context
        .invoke(move || registry.assert_on_main("refresh"))
        .await
        .unwrap();
    assert!(before.is_ok());

    harness.registry.install(None);

    let registry = Arc::clone(&harness.registry);
    let after = harness
        .context
        .invoke(move || registry.assert_on_main("refresh"))
        .await
        .unwrap();
    assert!(matches!(after, Err(ThreadingError::NoContext { .. })));
    harness.shutdown();
}
