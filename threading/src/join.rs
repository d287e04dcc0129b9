use tokio_util::sync::CancellationToken;

use crate::{ContextRegistry, ThreadingError};

impl ContextRegistry {
    /// Wait until every tracked operation of the installed context is done.
    ///
    /// Returns `Ok(())` once the collection is observed empty. If `cancellation`
    /// fires first, returns [`ThreadingError::JoinCanceled`] with the number of
    /// tracked entries left behind, supervisors included; those keep running.
    /// Must be awaited off the UI thread, since failure reports still need the
    /// message loop to drain.
    pub async fn join_pending_operations(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<(), ThreadingError> {
        self.assert_off_main("join_pending_operations")?;
        let factory = self.factory_for("join_pending_operations")?;
        let tracked = factory.tracked();

        let pending = tracked.len();
        if pending > 0 {
            tracing::debug!(pending, "Joining pending operations");
        }

        tokio::select! {
            biased;
            () = tracked.wait_until_empty() => Ok(()),
            () = cancellation.cancelled() => {
                let outstanding = tracked.len();
                tracing::warn!(outstanding, pending = ?tracked.pending(), "Join of pending operations canceled");
                Err(ThreadingError::JoinCanceled { outstanding })
            }
        }
    }
}
