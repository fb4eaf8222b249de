//! Inheritance-aware resolution.
//!
//! A read starts at the innermost running context. Under an inheriting
//! policy it walks the lightweight chain first, then the heavyweight chain
//! starting at the heavyweight context the lightweight chain hangs from
//! (the current heavyweight context when there is no lightweight one), and
//! returns the first value it finds. When nothing is found and the policy has a default, the
//! default is computed once and written into the current context exactly
//! like [`Resolver::assign`] would, so later reads in that context (and its
//! descendants) see the same value without calling the factory again.
//!
//! Writes only ever touch the current context. Code that runs on a thread
//! outside any fiber or task is running in the thread's root lightweight
//! context, which shares the heavyweight context's store; its writes are
//! therefore published where heavyweight-chain reads from descendant
//! threads look. Fibers and tasks created by user code always sit below
//! that root, so their writes stay in their own stores.

use std::sync::Arc;

use tracing::trace;

use crate::context::{ContextId, ExecutionContext};
use crate::error::AttributeError;
use crate::native::NativeProvider;
use crate::policy::Policy;
use crate::provider::ExecutionContextProvider;
use crate::store::{ContextKey, Value};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Stored in the current context.
    Local(ContextId),
    /// Stored in an ancestor `depth` hops away.
    Ancestor { id: ContextId, depth: usize },
    /// Computed by the default factory during this read.
    Default,
    /// Nothing stored and no default.
    Absent,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Local(id) => write!(f, "local ({id})"),
            Source::Ancestor { id, depth } => write!(f, "ancestor {id} at depth {depth}"),
            Source::Default => f.write_str("default"),
            Source::Absent => f.write_str("absent"),
        }
    }
}

/// A resolved value together with its [`Source`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub value: Option<Value>,
    pub source: Source,
}

impl Resolution {
    fn absent() -> Self {
        Self {
            value: None,
            source: Source::Absent,
        }
    }
}

/// Resolves reads and performs writes against the contexts reported by a
/// provider.
#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn ExecutionContextProvider>,
}

impl Resolver {
    pub fn new(provider: Arc<dyn ExecutionContextProvider>) -> Self {
        Self { provider }
    }

    /// A resolver over the process-wide [`NativeProvider`].
    pub fn native() -> Self {
        Self::new(NativeProvider::shared())
    }

    pub fn provider(&self) -> &Arc<dyn ExecutionContextProvider> {
        &self.provider
    }

    /// The innermost running context.
    pub fn current(&self) -> Arc<ExecutionContext> {
        self.provider.current()
    }

    /// Effective value of `key` for the current context under `policy`.
    pub fn resolve(&self, key: &ContextKey, policy: &Policy) -> Result<Option<Value>, AttributeError> {
        self.resolve_traced(key, policy).map(|r| r.value)
    }

    /// Like [`resolve`](Self::resolve), also reporting where the value came from.
    pub fn resolve_traced(
        &self,
        key: &ContextKey,
        policy: &Policy,
    ) -> Result<Resolution, AttributeError> {
        let heavyweight = self.provider.current_heavyweight();
        let lightweight = self.provider.current_lightweight();

        let found = if policy.inherits() {
            search_chain(key, lightweight.as_ref(), &heavyweight)
        } else {
            let current = lightweight.as_ref().unwrap_or(&heavyweight);
            current.get(key).map(|value| (value, Source::Local(current.id())))
        };

        if let Some((value, source)) = found {
            trace!(%key, ?source, "Resolved");
            return Ok(Resolution {
                value: Some(value),
                source,
            });
        }

        let Some(factory) = policy.factory() else {
            trace!(%key, "Resolved to nothing");
            return Ok(Resolution::absent());
        };

        let value = factory().map_err(|source| AttributeError::DefaultFactory {
            key: key.clone(),
            source,
        })?;
        trace!(%key, "Materialized default");
        let value = write(key, value, lightweight.as_ref(), &heavyweight);
        Ok(Resolution {
            value: Some(value),
            source: Source::Default,
        })
    }

    /// Whether `key` resolves to a stored value (defaults are not computed).
    pub fn is_set(&self, key: &ContextKey, policy: &Policy) -> bool {
        let heavyweight = self.provider.current_heavyweight();
        let lightweight = self.provider.current_lightweight();
        if policy.inherits() {
            search_chain(key, lightweight.as_ref(), &heavyweight).is_some()
        } else {
            lightweight.as_ref().unwrap_or(&heavyweight).has(key)
        }
    }

    /// Write `value` into the current context and return it.
    pub fn assign(&self, key: &ContextKey, value: Value) -> Value {
        let heavyweight = self.provider.current_heavyweight();
        let lightweight = self.provider.current_lightweight();
        write(key, value, lightweight.as_ref(), &heavyweight)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("root", &self.provider.tracker().root().id())
            .finish()
    }
}

fn search_chain(
    key: &ContextKey,
    lightweight: Option<&Arc<ExecutionContext>>,
    heavyweight: &Arc<ExecutionContext>,
) -> Option<(Value, Source)> {
    let mut depth = 0;

    let mut cursor = lightweight.cloned();
    while let Some(ctx) = cursor.take_if(|c| c.is_lightweight()) {
        if let Some(value) = ctx.get(key) {
            return Some((value, source_at(ctx.id(), depth)));
        }
        cursor = ctx.parent();
        depth += 1;
    }

    // The lightweight chain ends at the heavyweight context that created its
    // outermost member. That is the current heavyweight context unless the
    // chain was resumed on another thread, such as a tokio worker.
    let mut cursor = cursor.or_else(|| Some(Arc::clone(heavyweight)));
    while let Some(ctx) = cursor {
        if let Some(value) = ctx.get(key) {
            return Some((value, source_at(ctx.id(), depth)));
        }
        cursor = ctx.parent();
        depth += 1;
    }

    None
}

fn source_at(id: ContextId, depth: usize) -> Source {
    if depth == 0 {
        Source::Local(id)
    } else {
        Source::Ancestor { id, depth }
    }
}

fn write(
    key: &ContextKey,
    value: Value,
    lightweight: Option<&Arc<ExecutionContext>>,
    heavyweight: &Arc<ExecutionContext>,
) -> Value {
    let target = lightweight.unwrap_or(heavyweight);
    trace!(%key, context = %target.id(), kind = %target.kind(), "Assigned");
    target.set(key.clone(), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ManualProvider;
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<ManualProvider>, Resolver) {
        let provider = Arc::new(ManualProvider::new("main"));
        let resolver = Resolver::new(provider.clone());
        (provider, resolver)
    }

    fn key() -> ContextKey {
        ContextKey::new("Settings", "setting")
    }

    fn text(value: Option<Value>) -> Option<String> {
        value.and_then(|v| v.downcast_ref::<String>().cloned())
    }

    fn val(s: &str) -> Value {
        Arc::new(s.to_string())
    }

    #[test]
    fn test_absent_without_default() {
        let (_, resolver) = setup();
        let resolution = resolver.resolve_traced(&key(), &Policy::new()).unwrap();
        assert!(resolution.value.is_none());
        assert_eq!(resolution.source, Source::Absent);
    }

    #[test]
    fn test_local_write_then_read() {
        let (provider, resolver) = setup();
        resolver.assign(&key(), val("v"));
        let resolution = resolver.resolve_traced(&key(), &Policy::new()).unwrap();
        assert_eq!(text(resolution.value), Some("v".into()));
        assert_eq!(resolution.source, Source::Local(provider.tracker().root().id()));
    }

    #[test]
    fn test_none_policy_ignores_ancestors() {
        let (provider, resolver) = setup();
        resolver.assign(&key(), val("parent"));
        let child = provider.spawn_heavyweight("child");

        let value = provider.run_in(&child, None, || resolver.resolve(&key(), &Policy::new()));
        assert!(value.unwrap().is_none());
    }

    #[test]
    fn test_inherit_walks_heavyweight_chain() {
        let (provider, resolver) = setup();
        resolver.assign(&key(), val("top"));
        let child = provider.spawn_heavyweight("child");
        let grandchild = provider.run_in(&child, None, || provider.spawn_heavyweight("grandchild"));

        let resolution = provider
            .run_in(&grandchild, None, || {
                resolver.resolve_traced(&key(), &Policy::new().inherit(true))
            })
            .unwrap();
        assert_eq!(text(resolution.value), Some("top".into()));
        assert_eq!(
            resolution.source,
            Source::Ancestor {
                id: provider.tracker().root().id(),
                depth: 2
            }
        );
    }

    #[test]
    fn test_inherit_prefers_nearest() {
        let (provider, resolver) = setup();
        resolver.assign(&key(), val("root"));
        let child = provider.spawn_heavyweight("child");
        provider.run_in(&child, None, || resolver.assign(&key(), val("child")));
        let grandchild = provider.run_in(&child, None, || provider.spawn_heavyweight("grandchild"));

        let value = provider
            .run_in(&grandchild, None, || resolver.resolve(&key(), &Policy::new().inherit(true)))
            .unwrap();
        assert_eq!(text(value), Some("child".into()));
    }

    #[test]
    fn test_lightweight_chain_then_current_heavyweight() {
        let (provider, resolver) = setup();
        let thread = provider.spawn_heavyweight("thread");
        provider.run_in(&thread, None, || resolver.assign(&key(), val("thread")));
        let outer = provider.run_in(&thread, None, || provider.spawn_lightweight("outer"));
        let inner = provider.run_in(&thread, Some(&outer), || provider.spawn_lightweight("inner"));

        let resolution = provider
            .run_in(&thread, Some(&inner), || {
                resolver.resolve_traced(&key(), &Policy::new().inherit(true))
            })
            .unwrap();
        assert_eq!(text(resolution.value), Some("thread".into()));
        assert_eq!(
            resolution.source,
            Source::Ancestor {
                id: thread.id(),
                depth: 2
            }
        );
    }

    #[test]
    fn test_lightweight_resumed_elsewhere_reads_creator_chain() {
        let (provider, resolver) = setup();
        let creator = provider.spawn_heavyweight("creator");
        let worker = provider.spawn_heavyweight("worker");
        provider.run_in(&creator, None, || resolver.assign(&key(), val("creator")));
        provider.run_in(&worker, None, || resolver.assign(&key(), val("worker")));
        let task = provider.run_in(&creator, None, || provider.spawn_lightweight("task"));

        let resolution = provider
            .run_in(&worker, Some(&task), || {
                resolver.resolve_traced(&key(), &Policy::new().inherit(true))
            })
            .unwrap();
        assert_eq!(text(resolution.value), Some("creator".into()));
        assert_eq!(
            resolution.source,
            Source::Ancestor {
                id: creator.id(),
                depth: 1
            }
        );
    }

    #[test]
    fn test_heavyweight_write_visible_to_descendant_threads() {
        let (provider, resolver) = setup();
        let thread = provider.spawn_heavyweight("thread");
        provider.run_in(&thread, None, || resolver.assign(&key(), val("v")));
        let child = provider.run_in(&thread, None, || provider.spawn_heavyweight("child"));

        let value = provider
            .run_in(&child, None, || resolver.resolve(&key(), &Policy::new().inherit(true)))
            .unwrap();
        assert_eq!(text(value), Some("v".into()));
    }

    #[test]
    fn test_lightweight_writes_stay_local() {
        let (provider, resolver) = setup();
        let thread = provider.spawn_heavyweight("thread");
        let outer = provider.run_in(&thread, None, || provider.spawn_lightweight("outer"));
        let inner = provider.run_in(&thread, Some(&outer), || provider.spawn_lightweight("inner"));

        provider.run_in(&thread, Some(&outer), || resolver.assign(&key(), val("outer")));
        provider.run_in(&thread, Some(&inner), || resolver.assign(&key(), val("inner")));
        assert_eq!(text(outer.get(&key())), Some("outer".into()));
        assert_eq!(text(inner.get(&key())), Some("inner".into()));
        assert!(!thread.has(&key()));
    }

    #[test]
    fn test_default_materialized_once() {
        let (_, resolver) = setup();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let policy = Policy::new().with_default(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            String::from("fallback")
        });

        let first = resolver.resolve_traced(&key(), &policy).unwrap();
        let second = resolver.resolve_traced(&key(), &policy).unwrap();

        assert_eq!(first.source, Source::Default);
        assert!(matches!(second.source, Source::Local(_)));
        assert!(Arc::ptr_eq(
            first.value.as_ref().unwrap(),
            second.value.as_ref().unwrap()
        ));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_factory_error_propagates() {
        let (_, resolver) = setup();
        let policy = Policy::new().with_try_default(|| -> Result<String, std::io::Error> {
            Err(std::io::Error::other("backend down"))
        });

        let err = resolver.resolve(&key(), &policy).unwrap_err();
        match &err {
            AttributeError::DefaultFactory { key: k, source } => {
                assert_eq!(k, &key());
                assert_eq!(source.to_string(), "backend down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!resolver.is_set(&key(), &Policy::new()), "failure must not store anything");
    }

    #[test]
    fn test_is_set_does_not_compute_default() {
        let (_, resolver) = setup();
        let policy = Policy::new().with_default(|| 1_u32);
        assert!(!resolver.is_set(&key(), &policy));
        assert!(!resolver.is_set(&key(), &policy));
        resolver.resolve(&key(), &policy).unwrap();
        assert!(resolver.is_set(&key(), &policy));
    }

    #[test]
    fn test_reclaimed_ancestor_ends_chain() {
        let (provider, resolver) = setup();
        let middle = provider.spawn_heavyweight("middle");
        provider.run_in(&middle, None, || resolver.assign(&key(), val("middle")));
        let leaf = provider.run_in(&middle, None, || provider.spawn_heavyweight("leaf"));
        drop(middle);

        let value = provider
            .run_in(&leaf, None, || resolver.resolve(&key(), &Policy::new().inherit(true)))
            .unwrap();
        assert!(value.is_none());
    }
}
