//! The execution context registry.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::runtime::Handle;

use crate::{ExecutionContext, FailureReporter, OperationFactory, ThreadingError};

/// Holds the installed UI execution context and what derives from it.
///
/// One registry is built at startup and shared by `Arc` with everything that
/// needs affinity checks or background supervision.
///
/// Installing is expected to happen only at startup and teardown, never while
/// background operations are running. The lock only keeps the swap itself
/// consistent; operations already started keep the factory they started with.
pub struct ContextRegistry {
    installed: RwLock<Option<Installed>>,
    reporter: Arc<dyn FailureReporter>,
    runtime: Handle,
    design_mode: bool,
}

struct Installed {
    context: Arc<ExecutionContext>,
    factory: Arc<OperationFactory>,
}

impl ContextRegistry {
    /// `runtime` runs background operations and their supervisors.
    pub fn new(reporter: Arc<dyn FailureReporter>, runtime: Handle) -> Self {
        Self {
            installed: RwLock::new(None),
            reporter,
            runtime,
            design_mode: false,
        }
    }

    /// Skip UI-thread assertions, e.g. when hosted by a visual designer.
    pub fn with_design_mode(mut self, design_mode: bool) -> Self {
        self.design_mode = design_mode;
        self
    }

    #[must_use]
    pub fn design_mode(&self) -> bool {
        self.design_mode
    }

    /// Install `context`, or clear the registry with `None`.
    ///
    /// Re-installing the context already installed is a no-op and keeps its
    /// tracked operations. Any other context gets a fresh, empty collection and
    /// factory.
    pub fn install(&self, context: Option<Arc<ExecutionContext>>) {
        let mut installed = self
            .installed
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match context {
            None => {
                if let Some(previous) = installed.take() {
                    let pending = previous.factory.tracked().len();
                    if pending > 0 {
                        tracing::warn!(pending, "Execution context cleared with operations pending");
                    }
                    tracing::debug!("Execution context cleared");
                }
            }
            Some(context) => {
                if installed
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(&current.context, &context))
                {
                    return;
                }
                let factory = Arc::new(OperationFactory::new(
                    Arc::clone(&context),
                    self.runtime.clone(),
                ));
                tracing::debug!(main_thread = ?context.main_thread(), "Execution context installed");
                *installed = Some(Installed { context, factory });
            }
        }
    }

    #[must_use]
    pub fn context(&self) -> Option<Arc<ExecutionContext>> {
        self.installed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| Arc::clone(&installed.context))
    }

    /// The factory bound to the installed context.
    pub fn current_factory(&self) -> Result<Arc<OperationFactory>, ThreadingError> {
        self.factory_for("current_factory")
    }

    /// False when no context is installed.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        self.context()
            .is_some_and(|context| context.is_main_thread())
    }

    pub(crate) fn factory_for(&self, caller: &str) -> Result<Arc<OperationFactory>, ThreadingError> {
        self.installed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| Arc::clone(&installed.factory))
            .ok_or_else(|| ThreadingError::no_context(caller))
    }

    pub(crate) fn reporter(&self) -> Arc<dyn FailureReporter> {
        Arc::clone(&self.reporter)
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("context", &self.context())
            .field("design_mode", &self.design_mode)
            .finish_non_exhaustive()
    }
}
