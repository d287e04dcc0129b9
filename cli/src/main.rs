//! DarcUI - binary entry point.
//!
//! # Architecture
//!
//! The process main thread is the UI thread: it runs the [`MessageLoop`] and
//! nothing else. Background work runs on a tokio runtime owned by `main`.
//!
//! ```text
//! main() -> init_tracing -> DarcConfig -> runtime + MessageLoop
//!             |                                  |
//!             v                                  v
//!      app::run() on runtime            message_loop.run() on main thread
//!             |  Ctrl-C
//!             v
//!      cancel -> join_pending_operations (bounded) -> quit message loop
//! ```

mod app;
mod reporter;

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use darcui_config::DarcConfig;
use darcui_threading::{ContextRegistry, MessageLoop};

use crate::reporter::ConsoleReporter;

const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const DEFAULT_LOG_FILTER: &str = "info";
const LOG_FILE_NAME: &str = "darcui.log";

/// Install the global subscriber.
///
/// Returns the log file in use, if any, and the candidates that could not be
/// opened, so the caller can log them once the subscriber is up. Without a
/// file nothing is printed: stdout belongs to the UI.
fn init_tracing() -> (Option<PathBuf>, Vec<String>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let mut rejected = Vec::new();
    let opened = log_file_candidates().find_map(|path| match open_for_append(&path) {
        Ok(file) => Some((path, file)),
        Err(err) => {
            rejected.push(format!("{}: {err}", path.display()));
            None
        }
    });
    let (path, file) = opened.unzip();

    tracing_subscriber::registry()
        .with(filter)
        .with(file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file))))
        .init();

    (path, rejected)
}

/// `logs/darcui.log` next to the user config, then under `./.darcui`.
fn log_file_candidates() -> impl Iterator<Item = PathBuf> {
    let config_dir = DarcConfig::path().and_then(|path| path.parent().map(Path::to_path_buf));
    config_dir
        .into_iter()
        .chain([PathBuf::from(".darcui")])
        .map(|dir| dir.join("logs").join(LOG_FILE_NAME))
}

fn open_for_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn load_config() -> DarcConfig {
    match DarcConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(path = %err.path().display(), "Using default config: {err}");
            DarcConfig::default()
        }
    }
}

fn build_runtime(worker_threads: Option<usize>) -> Result<Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("darcui-worker");
    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }
    builder.build().context("failed to start background runtime")
}

fn main() -> Result<()> {
    let (log_path, rejected) = init_tracing();
    if let Some(path) = &log_path {
        tracing::info!(path = %path.display(), "Logging initialized");
    }
    for candidate in rejected {
        tracing::warn!("Log file unavailable: {candidate}");
    }

    let config = load_config();
    let runtime = build_runtime(config.worker_threads())?;

    let (message_loop, context) = MessageLoop::for_current_thread();
    let reporter = Arc::new(ConsoleReporter::default());
    let registry = Arc::new(
        ContextRegistry::new(reporter.clone(), runtime.handle().clone())
            .with_design_mode(config.design_mode()),
    );
    registry.install(Some(context));

    let session = runtime.spawn(app::run(Arc::clone(&registry), config.shutdown_timeout()));

    let dispatched = message_loop.run();
    tracing::info!(
        dispatched,
        failures = reporter.failures(),
        "UI message loop finished"
    );

    let result = runtime
        .block_on(session)
        .context("application session panicked")
        .and_then(|session| session);

    registry.install(None);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    if let Err(err) = &result {
        eprintln!("Error: {err:?}");
    }
    result
}
