//! Flattening background failures into one reportable value.

use std::{backtrace::BacktraceStatus, fmt};

use crate::OperationId;

/// Frames from these crates are executor and unwinding plumbing; they say
/// nothing about where the failure came from.
const RUNTIME_CRATES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "futures_util::",
    "futures_core::",
    "anyhow::",
    "darcui_threading::",
];

/// Unmangled entry, thread-start and unwinding symbols. Matched exactly.
const RUNTIME_SYMBOLS: &[&str] = &[
    "_start",
    "__libc_start_main",
    "__libc_start_call_main",
    "start_thread",
    "clone",
    "clone3",
    "__clone",
    "__clone3",
    "main",
    "rust_begin_unwind",
    "rust_panic",
    "__rust_try",
    "__rust_start_panic",
    "__rust_begin_short_backtrace",
    "__rust_end_short_backtrace",
];

const CLOSURE_SUFFIX: &str = "::{{closure}}";

/// A background failure, normalized for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    operation: OperationId,
    summary: String,
    causes: Vec<String>,
    backtrace: Option<String>,
}

impl FailureReport {
    #[must_use]
    pub fn from_error(operation: OperationId, error: &anyhow::Error) -> Self {
        let backtrace = match error.backtrace().status() {
            BacktraceStatus::Captured => {
                Some(normalize_backtrace(&error.backtrace().to_string()))
            }
            _ => None,
        };
        Self {
            operation,
            summary: error.to_string(),
            causes: error.chain().skip(1).map(ToString::to_string).collect(),
            backtrace,
        }
    }

    #[must_use]
    pub fn operation(&self) -> OperationId {
        self.operation
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Source errors, outermost first, excluding the summary itself.
    #[must_use]
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    #[must_use]
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        for cause in &self.causes {
            write!(f, "\n  caused by: {cause}")?;
        }
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n\n{backtrace}")?;
        }
        Ok(())
    }
}

/// Strip runtime plumbing from a `std::backtrace::Backtrace` rendering.
///
/// Frames are renumbered after filtering and async state-machine suffixes
/// (`::{{closure}}`) are collapsed, so an `async fn` shows up as itself rather
/// than as a chain of poll closures.
#[must_use]
pub fn normalize_backtrace(raw: &str) -> String {
    let mut frames: Vec<(String, Vec<&str>)> = Vec::new();
    let mut skipping = false;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        if let Some(symbol) = frame_symbol(trimmed) {
            skipping = is_runtime_frame(symbol);
            if skipping {
                continue;
            }
            let symbol = collapse_closures(symbol);
            // Adjacent poll closures of the same async fn collapse into one frame.
            if frames.last().is_some_and(|(last, _)| *last == symbol) {
                skipping = true;
                continue;
            }
            frames.push((symbol, Vec::new()));
        } else if !skipping
            && !trimmed.is_empty()
            && let Some((_, locations)) = frames.last_mut()
        {
            locations.push(trimmed);
        }
    }

    let mut out = String::new();
    for (index, (symbol, locations)) in frames.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{index:>4}: {symbol}"));
        for location in locations {
            out.push_str(&format!("\n             {location}"));
        }
    }
    out
}

fn frame_symbol(line: &str) -> Option<&str> {
    let (number, symbol) = line.split_once(": ")?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(symbol.trim())
}

fn is_runtime_frame(symbol: &str) -> bool {
    if RUNTIME_SYMBOLS.contains(&symbol) {
        return true;
    }
    let path = symbol.trim_start_matches('<');
    RUNTIME_CRATES.iter().any(|krate| path.starts_with(krate))
}

fn collapse_closures(symbol: &str) -> String {
    let mut collapsed = symbol;
    while let Some(stripped) = collapsed.strip_suffix(CLOSURE_SUFFIX) {
        collapsed = stripped;
    }
    collapsed.to_string()
}

/// Receives failures from supervised background operations.
///
/// Always invoked on the UI thread, once per failed operation. How the failure
/// is surfaced (dialog, log, telemetry) is up to the host.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: FailureReport);
}

impl<F> FailureReporter for F
where
    F: Fn(FailureReport) + Send + Sync,
{
    fn report(&self, failure: FailureReport) {
        self(failure);
    }
}

/// Logs failures at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: FailureReport) {
        tracing::error!(
            operation = %failure.operation(),
            causes = ?failure.causes(),
            "Unhandled background failure: {}",
            failure.summary()
        );
    }
}
