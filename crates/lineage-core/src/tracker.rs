//! Context hierarchy tracker.
//!
//! Records, for every new context, its parent at the instant of creation.
//! Providers call the creation hooks synchronously while constructing a
//! thread, fiber or task, strictly before the new context runs any code, so
//! the parent link is never observed half-initialized.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::context::{ContextKind, ExecutionContext};

/// Creates execution contexts and owns the designated root context.
#[derive(Debug)]
pub struct HierarchyTracker {
    root: Arc<ExecutionContext>,
    created: AtomicU64,
}

impl HierarchyTracker {
    /// Create a tracker whose root heavyweight context is named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = ExecutionContext::new(ContextKind::Heavyweight, Some(root_name.into()), None);
        debug!(id = %root.id(), name = ?root.name(), "Root context created");
        Self {
            root,
            created: AtomicU64::new(1),
        }
    }

    /// The root heavyweight context. It has no parent.
    pub fn root(&self) -> &Arc<ExecutionContext> {
        &self.root
    }

    /// Creation hook for a new heavyweight context spawned by `parent`.
    pub fn heavyweight_created(
        &self,
        parent: &Arc<ExecutionContext>,
        name: Option<String>,
    ) -> Arc<ExecutionContext> {
        debug_assert!(
            parent.is_heavyweight(),
            "heavyweight contexts are parented to heavyweight contexts"
        );
        self.create(ContextKind::Heavyweight, name, Some(parent))
    }

    /// Creation hook for a new lightweight context. `parent` is whatever
    /// context (heavyweight or lightweight) was active at creation.
    pub fn lightweight_created(
        &self,
        parent: &Arc<ExecutionContext>,
        name: Option<String>,
    ) -> Arc<ExecutionContext> {
        self.create(ContextKind::Lightweight, name, Some(parent))
    }

    /// Context for a heavyweight unit of execution that existed before the
    /// tracker saw it. Its parent is the root.
    pub fn adopt_preexisting(&self, name: Option<String>) -> Arc<ExecutionContext> {
        self.create(ContextKind::Heavyweight, name, Some(&self.root))
    }

    /// The parent of `context`, or `None` for the root and for contexts
    /// whose parent has been reclaimed.
    pub fn parent_of(&self, context: &ExecutionContext) -> Option<Arc<ExecutionContext>> {
        context.parent()
    }

    /// Iterate over the live ancestors of `context`, nearest first.
    pub fn ancestors(&self, context: &Arc<ExecutionContext>) -> Ancestors {
        Ancestors {
            next: context.parent(),
        }
    }

    /// Number of contexts created by this tracker, the root included.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    fn create(
        &self,
        kind: ContextKind,
        name: Option<String>,
        parent: Option<&Arc<ExecutionContext>>,
    ) -> Arc<ExecutionContext> {
        let context = ExecutionContext::new(kind, name, parent);
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(
            id = %context.id(),
            %kind,
            name = ?context.name(),
            parent = ?parent.map(|p| p.id()),
            "Context created"
        );
        context
    }
}

impl Default for HierarchyTracker {
    fn default() -> Self {
        Self::new("root")
    }
}

/// Iterator over an ancestor chain.
pub struct Ancestors {
    next: Option<Arc<ExecutionContext>>,
}

impl Iterator for Ancestors {
    type Item = Arc<ExecutionContext>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}
