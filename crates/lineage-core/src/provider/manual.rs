//! Provider for hosts that drive scheduling themselves.
//!
//! The host creates contexts through [`ManualProvider::spawn_heavyweight`] and
//! [`ManualProvider::spawn_lightweight`] and marks which ones are running with
//! [`ManualProvider::enter`]. There is a single "current" pair per provider,
//! which matches a host that runs one context at a time (an interpreter, a
//! simulation, or a deterministic test harness).

use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::context::ExecutionContext;
use crate::provider::ExecutionContextProvider;
use crate::tracker::HierarchyTracker;

#[derive(Clone)]
struct Current {
    heavyweight: Arc<ExecutionContext>,
    lightweight: Option<Arc<ExecutionContext>>,
}

/// A provider whose current contexts are set explicitly by the host.
pub struct ManualProvider {
    tracker: HierarchyTracker,
    current: RwLock<Current>,
}

impl ManualProvider {
    /// Create a provider whose root context is current.
    pub fn new(root_name: impl Into<String>) -> Self {
        let tracker = HierarchyTracker::new(root_name);
        let current = Current {
            heavyweight: Arc::clone(tracker.root()),
            lightweight: None,
        };
        Self {
            tracker,
            current: RwLock::new(current),
        }
    }

    /// Create a heavyweight context parented to the current heavyweight one.
    pub fn spawn_heavyweight(&self, name: &str) -> Arc<ExecutionContext> {
        let parent = self.current_heavyweight();
        self.tracker.heavyweight_created(&parent, Some(name.to_string()))
    }

    /// Create a lightweight context parented to the innermost current one.
    pub fn spawn_lightweight(&self, name: &str) -> Arc<ExecutionContext> {
        let parent = self.current();
        self.tracker.lightweight_created(&parent, Some(name.to_string()))
    }

    /// Make `heavyweight` (and optionally `lightweight`) current until the
    /// returned guard is dropped.
    pub fn enter(
        &self,
        heavyweight: &Arc<ExecutionContext>,
        lightweight: Option<&Arc<ExecutionContext>>,
    ) -> SwitchGuard<'_> {
        debug_assert!(heavyweight.is_heavyweight());
        debug_assert!(lightweight.is_none_or(|l| l.is_lightweight()));

        let next = Current {
            heavyweight: Arc::clone(heavyweight),
            lightweight: lightweight.cloned(),
        };
        trace!(
            heavyweight = %next.heavyweight.id(),
            lightweight = ?next.lightweight.as_ref().map(|l| l.id()),
            "Switching contexts"
        );
        let prev = std::mem::replace(&mut *self.write(), next);
        SwitchGuard {
            provider: self,
            prev: Some(prev),
        }
    }

    /// Run `f` with the given contexts current, restoring the previous ones
    /// afterwards (also on unwind).
    pub fn run_in<R>(
        &self,
        heavyweight: &Arc<ExecutionContext>,
        lightweight: Option<&Arc<ExecutionContext>>,
        f: impl FnOnce() -> R,
    ) -> R {
        let _guard = self.enter(heavyweight, lightweight);
        f()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Current> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Current> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualProvider {
    fn default() -> Self {
        Self::new("root")
    }
}

impl ExecutionContextProvider for ManualProvider {
    fn tracker(&self) -> &HierarchyTracker {
        &self.tracker
    }

    fn current_heavyweight(&self) -> Arc<ExecutionContext> {
        Arc::clone(&self.read().heavyweight)
    }

    fn current_lightweight(&self) -> Option<Arc<ExecutionContext>> {
        self.read().lightweight.clone()
    }
}

/// Restores the previously current contexts on drop.
pub struct SwitchGuard<'a> {
    provider: &'a ManualProvider,
    prev: Option<Current>,
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            *self.provider.write() = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_current_initially() {
        let provider = ManualProvider::new("main");
        assert_eq!(provider.current_heavyweight().id(), provider.tracker().root().id());
        assert!(provider.current_lightweight().is_none());
        assert_eq!(provider.current().id(), provider.tracker().root().id());
    }

    #[test]
    fn test_spawn_captures_current_parent() {
        let provider = ManualProvider::default();
        let worker = provider.spawn_heavyweight("worker");

        let fiber = provider.run_in(&worker, None, || provider.spawn_lightweight("fiber"));
        assert_eq!(fiber.parent().map(|p| p.id()), Some(worker.id()));

        let nested = provider.run_in(&worker, Some(&fiber), || {
            provider.spawn_lightweight("nested")
        });
        assert_eq!(nested.parent().map(|p| p.id()), Some(fiber.id()));
    }

    #[test]
    fn test_guard_restores_previous() {
        let provider = ManualProvider::default();
        let worker = provider.spawn_heavyweight("worker");
        {
            let _guard = provider.enter(&worker, None);
            assert_eq!(provider.current().id(), worker.id());
        }
        assert_eq!(provider.current().id(), provider.tracker().root().id());
    }

    #[test]
    fn test_guard_restores_on_unwind() {
        let provider = ManualProvider::default();
        let worker = provider.spawn_heavyweight("worker");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: () = provider.run_in(&worker, None, || panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(provider.current().id(), provider.tracker().root().id());
    }
}
