use std::sync::atomic::{AtomicUsize, Ordering};

use darcui_threading::{FailureReport, FailureReporter};

/// Surfaces unhandled background failures on stderr and in the log.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    failures: AtomicUsize,
}

impl ConsoleReporter {
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

impl FailureReporter for ConsoleReporter {
    fn report(&self, failure: FailureReport) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            operation = %failure.operation(),
            causes = ?failure.causes(),
            "Unhandled background failure: {}",
            failure.summary()
        );
        eprintln!("{failure}");
    }
}
