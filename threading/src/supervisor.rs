//! Fire-and-forget supervision of background operations.
//!
//! A supervised operation is awaited by a tracked supervisor task, so the join
//! barrier waits for the failure report too, not just for the operation.
//! Outcomes are handled as follows:
//!
//! | Outcome   | Action                                                   |
//! |-----------|----------------------------------------------------------|
//! | Completed | untracked silently                                       |
//! | Canceled  | untracked silently                                       |
//! | Faulted   | filter consulted; if it agrees, reported on the UI thread |

use std::{future::Future, sync::Arc};

use crate::{
    BackgroundOperation, ContextRegistry, FailureReport, OperationFactory, OperationResult, Outcome,
    ThreadingError,
};

/// Decides whether a failure is worth reporting. Must be pure: it may be
/// consulted from any background thread.
pub type ReportFilter = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

impl ContextRegistry {
    /// Supervise `operation` without awaiting it. Every failure is reported.
    pub fn file_and_forget<T>(&self, operation: &BackgroundOperation<T>) -> Result<(), ThreadingError>
    where
        T: Send + Sync + 'static,
    {
        let factory = self.factory_for("file_and_forget")?;
        self.supervise(&factory, operation, None);
        Ok(())
    }

    /// Supervise `operation`, reporting a failure only when `should_report`
    /// returns true for it.
    pub fn file_and_forget_if<T, P>(
        &self,
        operation: &BackgroundOperation<T>,
        should_report: P,
    ) -> Result<(), ThreadingError>
    where
        T: Send + Sync + 'static,
        P: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        let factory = self.factory_for("file_and_forget_if")?;
        self.supervise(&factory, operation, Some(Arc::new(should_report)));
        Ok(())
    }

    /// Start `future` as a tracked operation and supervise it.
    pub fn spawn_and_forget<F, T>(&self, future: F) -> Result<BackgroundOperation<T>, ThreadingError>
    where
        F: Future<Output = OperationResult<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let factory = self.factory_for("spawn_and_forget")?;
        let operation = factory.run(future);
        self.supervise(&factory, &operation, None);
        Ok(operation)
    }

    pub fn spawn_and_forget_if<F, T, P>(
        &self,
        future: F,
        should_report: P,
    ) -> Result<BackgroundOperation<T>, ThreadingError>
    where
        F: Future<Output = OperationResult<T>> + Send + 'static,
        T: Send + Sync + 'static,
        P: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        let factory = self.factory_for("spawn_and_forget_if")?;
        let operation = factory.run(future);
        self.supervise(&factory, &operation, Some(Arc::new(should_report)));
        Ok(operation)
    }

    /// The supervisor is tracked by `factory`; for `spawn_and_forget` that is
    /// the factory the operation itself was started from.
    fn supervise<T>(
        &self,
        factory: &OperationFactory,
        operation: &BackgroundOperation<T>,
        should_report: Option<ReportFilter>,
    ) where
        T: Send + Sync + 'static,
    {
        let id = operation.id();
        if !operation.claim_supervision() {
            tracing::warn!(operation = %id, "Operation is already supervised; ignoring");
            return;
        }

        let operation = operation.clone();
        let reporter = self.reporter();
        let context = Arc::clone(factory.context());

        let _supervisor = factory.run(async move {
            let error = match operation.settled().await {
                Outcome::Completed(()) => return Ok(()),
                Outcome::Canceled => {
                    tracing::debug!(operation = %id, "Supervised operation canceled");
                    return Ok(());
                }
                Outcome::Faulted(error) => error,
            };

            if let Some(should_report) = should_report
                && !should_report(&*error)
            {
                tracing::debug!(operation = %id, error = %error, "Failure filtered out; not reporting");
                return Ok(());
            }

            let report = FailureReport::from_error(id, &error);
            let fallback = report.clone();
            if context.invoke(move || reporter.report(report)).await.is_err() {
                tracing::error!(
                    operation = %id,
                    "UI thread unavailable, failure not delivered to reporter: {fallback}"
                );
            }
            Ok(())
        });

        tracing::debug!(operation = %id, "Operation filed and forgotten");
    }
}
