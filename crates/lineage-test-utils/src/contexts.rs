//! Run the same test body in each kind of native context.

use std::fmt;

use lineage_core::native::{fiber, task, thread};
use tracing::debug;

/// How a test body gets its own child context of the calling context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSpawner {
    /// A heavyweight context on a new OS thread.
    Thread,
    /// A lightweight context resumed on the calling thread.
    Fiber,
    /// A lightweight context wrapping a future, driven to completion on a
    /// current-thread tokio runtime.
    Task,
    /// A lightweight context wrapping a future spawned onto a worker of a
    /// multi-threaded tokio runtime.
    WorkerTask,
}

impl ContextSpawner {
    pub const ALL: [ContextSpawner; 4] = [Self::Thread, Self::Fiber, Self::Task, Self::WorkerTask];

    /// Run `f` inside a new child context and return its result. Panics in
    /// `f` propagate to the caller.
    pub fn run<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        debug!(spawner = %self, "Running in child context");
        match self {
            ContextSpawner::Thread => match thread::spawn(f).join() {
                Ok(value) => value,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            ContextSpawner::Fiber => fiber::run(f),
            ContextSpawner::Task => {
                // Scope before entering the runtime so the parent is the
                // caller's context.
                let scoped = task::scope(async move { f() });
                tokio::runtime::Builder::new_current_thread()
                    .build()
                    .expect("failed to build test runtime")
                    .block_on(scoped)
            }
            ContextSpawner::WorkerTask => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .build()
                    .expect("failed to build test runtime");
                // `block_on` keeps the caller's context current, so the
                // spawned task is parented to it.
                match runtime.block_on(async move { task::spawn(async move { f() }).await }) {
                    Ok(value) => value,
                    Err(err) => std::panic::resume_unwind(err.into_panic()),
                }
            }
        }
    }
}

impl fmt::Display for ContextSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSpawner::Thread => f.write_str("thread"),
            ContextSpawner::Fiber => f.write_str("fiber"),
            ContextSpawner::Task => f.write_str("task"),
            ContextSpawner::WorkerTask => f.write_str("worker task"),
        }
    }
}
