//! Heavyweight contexts backed by std threads.
//!
//! Mirrors `std::thread::{spawn, Builder}`. The new context is created on
//! the spawning thread, parented to the spawner's heavyweight context, and
//! bound inside the new thread before the user closure runs.

use std::io;
use std::sync::Arc;
use std::thread::{JoinHandle, Scope, ScopedJoinHandle};

use crate::context::ExecutionContext;
use crate::provider::ExecutionContextProvider;

use super::NativeProvider;

/// Spawn a thread that runs in a new heavyweight context.
///
/// # Panics
///
/// Panics if the OS fails to create a thread; use [`Builder::spawn`] to
/// handle that case.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match Builder::new().spawn(f) {
        Ok(handle) => handle,
        Err(err) => panic!("failed to spawn thread: {err}"),
    }
}

/// Spawn a scoped thread that runs in a new heavyweight context.
///
/// # Panics
///
/// Panics if the OS fails to create a thread.
pub fn spawn_scoped<'scope, 'env, F, T>(
    scope: &'scope Scope<'scope, 'env>,
    f: F,
) -> ScopedJoinHandle<'scope, T>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    match Builder::new().spawn_scoped(scope, f) {
        Ok(handle) => handle,
        Err(err) => panic!("failed to spawn scoped thread: {err}"),
    }
}

/// Thread factory that records the new thread's parent context.
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name both the OS thread and its context.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn spawn<F, T>(self, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (builder, context) = self.prepare();
        builder.spawn(move || {
            super::bind_spawned(context);
            f()
        })
    }

    pub fn spawn_scoped<'scope, 'env, F, T>(
        self,
        scope: &'scope Scope<'scope, 'env>,
        f: F,
    ) -> io::Result<ScopedJoinHandle<'scope, T>>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        let (builder, context) = self.prepare();
        builder.spawn_scoped(scope, move || {
            super::bind_spawned(context);
            f()
        })
    }

    /// Capture the parent and create the child context on the calling thread.
    fn prepare(self) -> (std::thread::Builder, Arc<ExecutionContext>) {
        let provider = NativeProvider::instance();
        let parent = provider.current_heavyweight();
        let context = provider
            .tracker()
            .heavyweight_created(&parent, self.name.clone());

        let mut builder = std::thread::Builder::new();
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        (builder, context)
    }
}
