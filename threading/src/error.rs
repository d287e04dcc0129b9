use std::{fmt, sync::Arc};

use thiserror::Error;

/// Which side of the UI boundary a call was required to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRole {
    Main,
    Background,
}

impl fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadRole::Main => f.write_str("the UI thread"),
            ThreadRole::Background => f.write_str("a background thread"),
        }
    }
}

/// Errors surfaced by the threading layer.
///
/// Affinity, missing-context, and invalid-state errors are programmer errors:
/// they are returned immediately and never handled internally. Background
/// failures never show up here unless a caller explicitly reads the result of
/// a faulted operation.
#[derive(Debug, Clone, Error)]
pub enum ThreadingError {
    #[error("{caller} must be called on {expected}")]
    AffinityViolation { caller: String, expected: ThreadRole },

    #[error("{caller} requires an installed execution context")]
    NoContext { caller: String },

    #[error("operation was canceled")]
    Canceled,

    /// `outstanding` counts tracked entries, so a supervised operation that is
    /// still running counts twice: once for itself and once for its supervisor.
    #[error("join canceled with {outstanding} operation(s) still pending")]
    JoinCanceled { outstanding: usize },

    #[error("operation has not completed")]
    InvalidState,

    #[error("operation faulted: {0:#}")]
    Faulted(Arc<anyhow::Error>),

    #[error("the UI message loop has shut down")]
    MessageLoopClosed,
}

impl ThreadingError {
    pub(crate) fn affinity(caller: &str, expected: ThreadRole) -> Self {
        Self::AffinityViolation {
            caller: caller.to_owned(),
            expected,
        }
    }

    pub(crate) fn no_context(caller: &str) -> Self {
        Self::NoContext {
            caller: caller.to_owned(),
        }
    }

    /// True for both flavors of cooperative cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled | Self::JoinCanceled { .. })
    }
}
