//! Threading discipline for DarcUI.
//!
//! The UI runs on a single thread driven by a [`MessageLoop`]. Everything else
//! happens on a tokio runtime owned by the host. This crate is the seam between
//! the two:
//!
//! - **Affinity guards** ([`ContextRegistry::assert_on_main`],
//!   [`ContextRegistry::assert_off_main`]) reject calls made from the wrong
//!   thread.
//! - **Fire-and-forget supervision** ([`ContextRegistry::file_and_forget`])
//!   awaits background work nobody else awaits and funnels unhandled failures to
//!   one [`FailureReporter`], on the UI thread.
//! - **Join barrier** ([`ContextRegistry::join_pending_operations`]) drains all
//!   tracked work before shutdown, or gives up when a [`CancellationToken`] fires.
//! - **Completed-result accessors** ([`BackgroundOperation::completed_result`],
//!   [`BackgroundOperation::completed_or_default`]) read a finished operation
//!   without ever blocking the UI thread.
//!
//! ```text
//! host main thread              tokio runtime
//! ----------------              -------------
//! MessageLoop::run()  <-post--  supervisor (tracked)  <-await--  operation (tracked)
//!        |                             |
//!   FailureReporter             TrackedOperations  <--  join_pending_operations()
//! ```

mod affinity;
mod error;
mod factory;
mod join;
mod message_loop;
mod operation;
mod registry;
mod report;
mod supervisor;
mod tracked;

pub use error::{ThreadRole, ThreadingError};
pub use factory::OperationFactory;
pub use message_loop::{ExecutionContext, MessageLoop};
pub use operation::{BackgroundOperation, OperationError, OperationResult, OperationState, Outcome};
pub use registry::ContextRegistry;
pub use report::{FailureReport, FailureReporter, TracingReporter, normalize_backtrace};
pub use supervisor::ReportFilter;
pub use tracked::{OperationId, TrackedGuard, TrackedOperations};

pub use tokio_util::sync::CancellationToken;
