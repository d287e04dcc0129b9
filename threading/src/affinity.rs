//! UI thread affinity checks.

use crate::{ContextRegistry, ThreadRole, ThreadingError};

impl ContextRegistry {
    /// Fails unless called on the UI thread. Always passes in design mode.
    pub fn assert_on_main(&self, caller: &str) -> Result<(), ThreadingError> {
        if self.design_mode() {
            return Ok(());
        }

        let context = self
            .context()
            .ok_or_else(|| ThreadingError::no_context(caller))?;
        if context.is_main_thread() {
            Ok(())
        } else {
            Err(ThreadingError::affinity(caller, ThreadRole::Main))
        }
    }

    /// Fails when called on the UI thread. Design mode does not bypass this.
    pub fn assert_off_main(&self, caller: &str) -> Result<(), ThreadingError> {
        let context = self
            .context()
            .ok_or_else(|| ThreadingError::no_context(caller))?;
        if context.is_main_thread() {
            Err(ThreadingError::affinity(caller, ThreadRole::Background))
        } else {
            Ok(())
        }
    }

    /// Panics off the UI thread in debug builds; compiles to nothing otherwise.
    #[track_caller]
    pub fn debug_assert_on_main(&self) {
        if cfg!(debug_assertions) && !self.design_mode() {
            assert!(self.is_main_thread(), "Must be on the UI thread.");
        }
    }
}
