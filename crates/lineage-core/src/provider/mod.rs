//! The seam between the resolution engine and the host runtime.
//!
//! The core never inspects threads, fibers or tasks itself. A host
//! implements [`ExecutionContextProvider`] to report which contexts are
//! currently running and calls the [`HierarchyTracker`] creation hooks when
//! it constructs new ones.
//!
//! Two providers ship with the crate:
//!
//! - [`NativeProvider`](crate::native::NativeProvider) for std threads,
//!   [`Fiber`](crate::native::fiber::Fiber)s and tokio tasks.
//! - [`ManualProvider`] for hosts whose scheduler switches contexts
//!   explicitly.

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::tracker::HierarchyTracker;

pub mod manual;

pub use manual::ManualProvider;

/// Reports the currently running contexts.
pub trait ExecutionContextProvider: Send + Sync {
    /// The tracker that created every context this provider hands out.
    fn tracker(&self) -> &HierarchyTracker;

    /// The heavyweight context executing the caller.
    fn current_heavyweight(&self) -> Arc<ExecutionContext>;

    /// The lightweight context executing the caller, if the runtime has one
    /// active.
    fn current_lightweight(&self) -> Option<Arc<ExecutionContext>>;

    /// The innermost running context: lightweight if any, else heavyweight.
    fn current(&self) -> Arc<ExecutionContext> {
        self.current_lightweight()
            .unwrap_or_else(|| self.current_heavyweight())
    }
}
