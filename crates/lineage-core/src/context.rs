//! Execution context identity.
//!
//! An [`ExecutionContext`] stands for one heavyweight (preemptive thread) or
//! lightweight (cooperative fiber or task) unit of execution. It is created
//! by the [`HierarchyTracker`](crate::tracker::HierarchyTracker) together with
//! its parent link and owns a lazily-created [`LocalStore`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::store::{ContextKey, LocalStore, Value};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Scheduling model of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Preemptively scheduled (an OS thread).
    Heavyweight,
    /// Cooperatively scheduled inside a heavyweight context.
    Lightweight,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Heavyweight => f.write_str("heavyweight"),
            ContextKind::Lightweight => f.write_str("lightweight"),
        }
    }
}

/// A heavyweight or lightweight unit of execution that can own local storage.
///
/// The parent link is weak and written once at construction; a finished
/// parent is reclaimed normally and then reads as absent.
pub struct ExecutionContext {
    id: ContextId,
    kind: ContextKind,
    name: Option<String>,
    parent: Option<Weak<ExecutionContext>>,
    store: OnceCell<LocalStore>,
}

impl ExecutionContext {
    pub(crate) fn new(
        kind: ContextKind,
        name: Option<String>,
        parent: Option<&Arc<ExecutionContext>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ContextId::next(),
            kind,
            name,
            parent: parent.map(Arc::downgrade),
            store: OnceCell::new(),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn is_lightweight(&self) -> bool {
        self.kind == ContextKind::Lightweight
    }

    pub fn is_heavyweight(&self) -> bool {
        self.kind == ContextKind::Heavyweight
    }

    /// Display name, usually the thread or fiber name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The parent context, if it had one and it is still alive.
    pub fn parent(&self) -> Option<Arc<ExecutionContext>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// The local store, if anything has been written to it yet.
    pub fn store(&self) -> Option<&LocalStore> {
        self.store.get()
    }

    pub fn has(&self, key: &ContextKey) -> bool {
        self.store().is_some_and(|s| s.has(key))
    }

    pub fn get(&self, key: &ContextKey) -> Option<Value> {
        self.store().and_then(|s| s.get(key))
    }

    /// Write into this context's own store, creating it on first use.
    pub fn set(&self, key: ContextKey, value: Value) -> Value {
        self.store.get_or_init(LocalStore::new).set(key, value)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("parent", &self.parent().map(|p| p.id))
            .field("store", &self.store.get())
            .finish()
    }
}
