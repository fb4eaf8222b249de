//! Built-in provider for std threads, fibers and tokio tasks.
//!
//! Threads are heavyweight contexts; [`fiber::Fiber`]s and tasks wrapped by
//! [`task`] are lightweight contexts. Each OS thread carries two slots: the
//! heavyweight context bound to it and the lightweight context currently
//! running on it. Threads spawned through [`thread`] are bound before their
//! closure runs; any other thread is adopted on first use as a child of the
//! root context.
//!
//! The provider is process-wide. Call [`configure`] before first use to name
//! the root, and [`bind_root`] from `main` to make the main thread the root.

use std::cell::RefCell;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use lineage_config::HierarchyConfig;

use crate::context::{ContextId, ExecutionContext};
use crate::provider::ExecutionContextProvider;
use crate::tracker::HierarchyTracker;

pub mod fiber;
pub mod task;
pub mod thread;

thread_local! {
    static HEAVYWEIGHT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
    static LIGHTWEIGHT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
}

static SHARED: OnceCell<Arc<NativeProvider>> = OnceCell::new();

/// Errors from configuring the native provider.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("the native provider is already initialized")]
    AlreadyInitialized,

    #[error("this thread is already bound to context {0}")]
    AlreadyBound(ContextId),
}

/// Process-wide provider backed by thread-local context slots.
#[derive(Debug)]
pub struct NativeProvider {
    tracker: HierarchyTracker,
}

impl NativeProvider {
    /// The process-wide provider, created with a root named `"main"` if
    /// [`configure`] was not called first.
    pub fn shared() -> Arc<NativeProvider> {
        Arc::clone(Self::instance())
    }

    pub(crate) fn instance() -> &'static Arc<NativeProvider> {
        SHARED.get_or_init(|| Arc::new(Self::new(&HierarchyConfig::default())))
    }

    fn new(config: &HierarchyConfig) -> Self {
        Self {
            tracker: HierarchyTracker::new(config.root_name.clone()),
        }
    }
}

impl ExecutionContextProvider for NativeProvider {
    fn tracker(&self) -> &HierarchyTracker {
        &self.tracker
    }

    fn current_heavyweight(&self) -> Arc<ExecutionContext> {
        HEAVYWEIGHT.with(|slot| {
            let mut slot = slot.borrow_mut();
            let context = slot.get_or_insert_with(|| {
                let name = std::thread::current().name().map(str::to_owned);
                self.tracker.adopt_preexisting(name)
            });
            Arc::clone(context)
        })
    }

    fn current_lightweight(&self) -> Option<Arc<ExecutionContext>> {
        LIGHTWEIGHT.with(|slot| slot.borrow().clone())
    }
}

/// Initialize the process-wide provider from configuration.
///
/// Must run before anything touches the provider; afterwards the root name
/// is fixed.
pub fn configure(config: &HierarchyConfig) -> Result<Arc<NativeProvider>, HierarchyError> {
    let provider = Arc::new(NativeProvider::new(config));
    SHARED
        .set(Arc::clone(&provider))
        .map_err(|_| HierarchyError::AlreadyInitialized)?;
    debug!(root = %config.root_name, "Native provider configured");
    Ok(provider)
}

/// Bind the calling thread to the root context.
///
/// Intended for the thread running `main`, so threads it spawns and
/// threads adopted later all descend from it. Calling it again from the
/// same thread is a no-op.
pub fn bind_root() -> Result<Arc<ExecutionContext>, HierarchyError> {
    let root = Arc::clone(NativeProvider::instance().tracker.root());
    HEAVYWEIGHT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(bound) = slot.as_ref().filter(|b| b.id() != root.id()) {
            return Err(HierarchyError::AlreadyBound(bound.id()));
        }
        *slot = Some(Arc::clone(&root));
        debug!(id = %root.id(), "Thread bound to root context");
        Ok(root)
    })
}

/// The innermost context running on this thread.
pub fn current() -> Arc<ExecutionContext> {
    NativeProvider::instance().current()
}

/// Bind a freshly started thread to the context created for it.
pub(crate) fn bind_spawned(context: Arc<ExecutionContext>) {
    HEAVYWEIGHT.with(|slot| *slot.borrow_mut() = Some(context));
}

/// Make `context` the running lightweight context until the guard drops.
pub(crate) fn enter_lightweight(context: Arc<ExecutionContext>) -> LightweightGuard {
    let prev = LIGHTWEIGHT.with(|slot| slot.borrow_mut().replace(context));
    LightweightGuard { prev }
}

/// Restores the previously running lightweight context on drop.
pub(crate) struct LightweightGuard {
    prev: Option<Arc<ExecutionContext>>,
}

impl Drop for LightweightGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        LIGHTWEIGHT.with(|slot| *slot.borrow_mut() = prev);
    }
}
