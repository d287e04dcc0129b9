use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use tokio::runtime::Handle;

use crate::{
    BackgroundOperation, ExecutionContext, OperationResult, Outcome, ThreadingError,
    TrackedOperations,
};

/// Starts background operations bound to one execution context.
///
/// Every operation started here is tracked by the factory's collection from
/// the moment `run` is called until its outcome has been published.
pub struct OperationFactory {
    context: Arc<ExecutionContext>,
    tracked: TrackedOperations,
    runtime: Handle,
}

impl OperationFactory {
    pub(crate) fn new(context: Arc<ExecutionContext>, runtime: Handle) -> Self {
        Self {
            context,
            tracked: TrackedOperations::new(),
            runtime,
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    #[must_use]
    pub fn tracked(&self) -> &TrackedOperations {
        &self.tracked
    }

    /// Spawn `future` on the background runtime as a tracked operation.
    ///
    /// A panic inside the future settles the operation as faulted.
    pub fn run<F, T>(&self, future: F) -> BackgroundOperation<T>
    where
        F: Future<Output = OperationResult<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let guard = self.tracked.track();
        let id = guard.id();
        let (operation, completer) = BackgroundOperation::pending(id);

        self.runtime.spawn(async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => Outcome::from_result(result),
                Err(payload) => {
                    let message = panic_payload_to_string(&payload);
                    tracing::warn!(operation = %id, panic = %message, "Background operation panicked");
                    Outcome::Faulted(Arc::new(anyhow::anyhow!(
                        "background operation panicked: {message}"
                    )))
                }
            };
            tracing::debug!(operation = %id, state = ?outcome.state(), "Background operation settled");
            completer.complete(outcome);
            // Untrack only after the outcome is visible to joiners.
            drop(guard);
        });

        operation
    }

    /// Run `callback` on the UI thread and wait for it.
    pub async fn run_on_main<F, R>(&self, callback: F) -> Result<R, ThreadingError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.context.invoke(callback).await
    }
}

fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
