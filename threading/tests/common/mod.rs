//! Shared test utilities and fixtures
//!
//! Spins up a real UI thread running a `MessageLoop`, a registry bound to the
//! test's tokio runtime, and a reporter that records where it was called.

#![allow(dead_code)]

use std::{
    io,
    sync::{Arc, Mutex, mpsc},
    thread::{self, JoinHandle},
    time::Duration,
};

use darcui_threading::{
    CancellationToken, ContextRegistry, ExecutionContext, FailureReport, MessageLoop,
};
use tokio::runtime::Handle;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone)]
pub struct RecordedReport {
    pub failure: FailureReport,
    pub on_main_thread: bool,
}

pub struct Harness {
    pub registry: Arc<ContextRegistry>,
    pub context: Arc<ExecutionContext>,
    reports: Arc<Mutex<Vec<RecordedReport>>>,
    ui_thread: Option<JoinHandle<usize>>,
}

impl Harness {
    /// Must be called from inside a tokio runtime.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel();
        let ui_thread = thread::Builder::new()
            .name("ui".to_string())
            .spawn(move || {
                let (message_loop, context) = MessageLoop::for_current_thread();
                tx.send(context).expect("test thread waits for the context");
                message_loop.run()
            })
            .expect("spawn ui thread");
        let context = rx.recv().expect("ui thread sends its context");

        let reports = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let reports = Arc::clone(&reports);
            let context = Arc::clone(&context);
            move |failure: FailureReport| {
                reports.lock().unwrap().push(RecordedReport {
                    failure,
                    on_main_thread: context.is_main_thread(),
                });
            }
        };

        let registry = Arc::new(ContextRegistry::new(Arc::new(recorder), Handle::current()));
        registry.install(Some(Arc::clone(&context)));

        Self {
            registry,
            context,
            reports,
            ui_thread: Some(ui_thread),
        }
    }

    pub fn reports(&self) -> Vec<RecordedReport> {
        self.reports.lock().unwrap().clone()
    }

    /// Join everything tracked, failing the test after `limit`.
    pub async fn drain(&self, limit: Duration) {
        let deadline = cancel_after(limit);
        self.registry
            .join_pending_operations(&deadline)
            .await
            .expect("pending operations should drain");
    }

    /// Stop the UI thread and return how many callbacks it ran.
    pub fn shutdown(mut self) -> usize {
        self.context.quit();
        self.ui_thread
            .take()
            .map(|handle| handle.join().expect("ui thread exits cleanly"))
            .unwrap_or_default()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.context.quit();
    }
}

/// A token that fires after `delay`.
pub fn cancel_after(delay: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    token
}

/// Log lines emitted on the current thread while the guard from
/// [`CapturedLogs::install`] is alive.
///
/// Only sees events from tasks polled on the installing thread, so tests using
/// it run on a current-thread runtime.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
