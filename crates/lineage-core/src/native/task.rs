//! Lightweight contexts for tokio tasks.
//!
//! [`scope`] wraps a future in a new lightweight context whose parent is
//! captured when `scope` is called. Every poll of the wrapped future runs
//! with that context current on the polling thread, and the previous one is
//! restored when the poll returns, so suspension points never leak a
//! context into unrelated code.
//!
//! A task may be polled by a different thread than the one that created
//! it, such as a worker of a multi-threaded runtime. Reads still continue
//! from the creator's heavyweight context once the lightweight chain is
//! exhausted; the polling worker only matters for tasks that have no
//! lightweight ancestor left.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::context::ExecutionContext;
use crate::provider::ExecutionContextProvider;

use super::NativeProvider;

/// A future running inside its own lightweight context.
pub struct Scoped<F> {
    context: Arc<ExecutionContext>,
    inner: Pin<Box<F>>,
}

impl<F> Scoped<F> {
    /// The context the wrapped future runs in.
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = super::enter_lightweight(Arc::clone(&this.context));
        this.inner.as_mut().poll(cx)
    }
}

impl<F> fmt::Debug for Scoped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("context", &self.context.id())
            .finish_non_exhaustive()
    }
}

/// Wrap `future` in a new lightweight context parented to the innermost
/// context running now.
pub fn scope<F: Future>(future: F) -> Scoped<F> {
    scope_named(None, future)
}

pub fn scope_named<F: Future>(name: Option<String>, future: F) -> Scoped<F> {
    let provider = NativeProvider::instance();
    let parent = provider.current();
    let context = provider.tracker().lightweight_created(&parent, name);
    Scoped {
        context,
        inner: Box::pin(future),
    }
}

/// `tokio::spawn` in a new lightweight context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(scope(future))
}

/// `tokio::task::spawn_local` in a new lightweight context. Must be called
/// inside a `LocalSet`.
pub fn spawn_local<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    tokio::task::spawn_local(scope(future))
}
