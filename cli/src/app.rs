//! The host session: UI state lives on the message loop, work runs in the
//! background and hands results back through the execution context.

use std::{
    convert::identity,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;

use darcui_threading::{
    CancellationToken, ContextRegistry, OperationError, OperationFactory, OperationResult,
    ThreadingError,
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct StatusLine {
    heartbeats: u64,
}

/// UI-affine state. Mutated only from callbacks running on the message loop.
struct Ui {
    registry: Arc<ContextRegistry>,
    status: Mutex<StatusLine>,
}

impl Ui {
    fn new(registry: Arc<ContextRegistry>) -> Self {
        Self {
            registry,
            status: Mutex::default(),
        }
    }

    fn record_heartbeat(&self) -> Result<u64, ThreadingError> {
        self.registry.assert_on_main("Ui::record_heartbeat")?;
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.heartbeats += 1;
        println!("darcui: {} heartbeat(s)", status.heartbeats);
        Ok(status.heartbeats)
    }
}

/// Run until Ctrl-C, then drain background work and stop the message loop.
///
/// The message loop is always told to quit, even when startup fails.
pub async fn run(registry: Arc<ContextRegistry>, shutdown_timeout: Duration) -> Result<()> {
    let context = registry
        .context()
        .context("no execution context installed")?;
    let stop = CancellationToken::new();

    let started = start(&registry, &stop);
    if started.is_ok() {
        wait_for_shutdown().await;
    }

    stop.cancel();
    let drained = drain(&registry, shutdown_timeout).await;
    context.quit();

    started?;
    drained
}

fn start(registry: &Arc<ContextRegistry>, stop: &CancellationToken) -> Result<()> {
    registry.assert_off_main("app::start")?;
    let factory = registry.current_factory()?;
    let ui = Arc::new(Ui::new(Arc::clone(registry)));
    let heartbeat = registry.spawn_and_forget(heartbeat(factory, ui, stop.clone()))?;
    tracing::info!(operation = %heartbeat.id(), "Session started");
    Ok(())
}

async fn heartbeat(
    factory: Arc<OperationFactory>,
    ui: Arc<Ui>,
    stop: CancellationToken,
) -> OperationResult<()> {
    let mut ticks = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => return Err(OperationError::Canceled),
            _ = ticks.tick() => {}
        }

        let ui = Arc::clone(&ui);
        let beats = factory
            .run_on_main(move || ui.record_heartbeat())
            .await
            .and_then(identity)
            .context("failed to update status line")?;
        tracing::debug!(beats, "Heartbeat");
    }
}

async fn wait_for_shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {err}");
    }
    tracing::info!("Shutdown requested");
}

/// Wait for tracked operations, giving up after `timeout`.
async fn drain(registry: &ContextRegistry, timeout: Duration) -> Result<()> {
    let deadline = CancellationToken::new();
    let timer = {
        let deadline = deadline.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        })
    };

    let joined = registry.join_pending_operations(&deadline).await;
    timer.abort();

    match joined {
        Ok(()) => {
            tracing::info!("Background operations drained");
            Ok(())
        }
        Err(err) if err.is_canceled() => {
            tracing::warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Abandoning background operations: {err}"
            );
            Ok(())
        }
        Err(err) => Err(err).context("failed to join background operations"),
    }
}
