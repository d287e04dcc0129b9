//! Handles to background operations and their outcomes.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use thiserror::Error;
use tokio::sync::watch;

use crate::{OperationId, ThreadingError};

/// How a background future ends when it does not produce a value.
///
/// Cancellation is an expected, cooperative outcome and is kept apart from
/// genuine failures so the supervisor can drop it without reporting.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("operation canceled")]
    Canceled,
    #[error(transparent)]
    Faulted(#[from] anyhow::Error),
}

pub type OperationResult<T> = Result<T, OperationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Completed,
    Faulted,
    Canceled,
}

impl OperationState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Terminal result of a background operation. Published once, never replaced.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Completed(T),
    Faulted(Arc<anyhow::Error>),
    Canceled,
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn state(&self) -> OperationState {
        match self {
            Self::Completed(_) => OperationState::Completed,
            Self::Faulted(_) => OperationState::Faulted,
            Self::Canceled => OperationState::Canceled,
        }
    }

    pub(crate) fn from_result(result: OperationResult<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(OperationError::Canceled) => Self::Canceled,
            Err(OperationError::Faulted(error)) => Self::Faulted(Arc::new(error)),
        }
    }

    fn without_value(&self) -> Outcome<()> {
        match self {
            Self::Completed(_) => Outcome::Completed(()),
            Self::Faulted(error) => Outcome::Faulted(Arc::clone(error)),
            Self::Canceled => Outcome::Canceled,
        }
    }
}

/// A cloneable handle to an operation started by an
/// [`OperationFactory`](crate::OperationFactory).
///
/// Reading the result synchronously is only allowed once the operation has
/// finished ([`completed_result`](Self::completed_result)); there is no
/// blocking wait, so the UI thread can never deadlock on background work.
pub struct BackgroundOperation<T> {
    id: OperationId,
    outcome: watch::Receiver<Option<Outcome<T>>>,
    filed: Arc<AtomicBool>,
}

impl<T> BackgroundOperation<T> {
    pub(crate) fn pending(id: OperationId) -> (Self, Completer<T>) {
        let (sender, outcome) = watch::channel(None);
        let operation = Self {
            id,
            outcome,
            filed: Arc::new(AtomicBool::new(false)),
        };
        (operation, Completer { sender })
    }

    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.outcome
            .borrow()
            .as_ref()
            .map_or(OperationState::Pending, Outcome::state)
    }

    /// True once the operation reached any terminal state.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Claim the single supervision slot. Only the first caller gets `true`.
    pub(crate) fn claim_supervision(&self) -> bool {
        !self.filed.swap(true, Ordering::AcqRel)
    }

    /// Wait for the terminal state, discarding the value.
    pub(crate) async fn settled(&self) -> Outcome<()> {
        self.wait_with(Outcome::without_value).await
    }

    async fn wait_with<R>(&self, read: impl Fn(&Outcome<T>) -> R) -> R {
        let mut outcome = self.outcome.clone();
        loop {
            let settled = outcome.borrow_and_update().as_ref().map(&read);
            if let Some(value) = settled {
                return value;
            }
            // The completer publishes before its sender goes away.
            if outcome.changed().await.is_err() {
                return read(&Outcome::Canceled);
            }
        }
    }
}

impl<T: Clone> BackgroundOperation<T> {
    /// Wait for the operation to finish.
    pub async fn outcome(&self) -> Outcome<T> {
        self.wait_with(Outcome::clone).await
    }

    /// The value of an operation already known to have completed.
    ///
    /// Fails with [`ThreadingError::InvalidState`] while the operation is still
    /// pending instead of waiting for it.
    pub fn completed_result(&self) -> Result<T, ThreadingError> {
        match self.outcome.borrow().as_ref() {
            None => Err(ThreadingError::InvalidState),
            Some(Outcome::Completed(value)) => Ok(value.clone()),
            Some(Outcome::Faulted(error)) => Err(ThreadingError::Faulted(Arc::clone(error))),
            Some(Outcome::Canceled) => Err(ThreadingError::Canceled),
        }
    }
}

impl<T: Clone + Default> BackgroundOperation<T> {
    /// The value if the operation completed successfully, `T::default()` otherwise.
    #[must_use]
    pub fn completed_or_default(&self) -> T {
        match self.outcome.borrow().as_ref() {
            Some(Outcome::Completed(value)) => value.clone(),
            _ => T::default(),
        }
    }
}

impl<T> Clone for BackgroundOperation<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            outcome: self.outcome.clone(),
            filed: Arc::clone(&self.filed),
        }
    }
}

impl<T> fmt::Debug for BackgroundOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundOperation")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Write side of a [`BackgroundOperation`]. Dropping it unpublished (the task
/// was torn down with its runtime) settles the operation as canceled.
pub(crate) struct Completer<T> {
    sender: watch::Sender<Option<Outcome<T>>>,
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, outcome: Outcome<T>) {
        self.sender.send_replace(Some(outcome));
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Outcome::Canceled);
            true
        });
    }
}
