//! Synchronous lightweight contexts.
//!
//! A [`Fiber`] captures its parent when it is created and runs its body to
//! completion when resumed, on whichever thread resumes it. While the body
//! runs, the fiber is the thread's current lightweight context; the previous
//! one is restored afterwards, including on unwind.

use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::provider::ExecutionContextProvider;

use super::NativeProvider;

/// A lightweight context paired with the code it will run.
pub struct Fiber<F> {
    context: Arc<ExecutionContext>,
    body: F,
}

impl<F, R> Fiber<F>
where
    F: FnOnce() -> R,
{
    /// Create a fiber whose parent is the innermost context running now.
    pub fn new(body: F) -> Self {
        Self::create(None, body)
    }

    pub fn named(name: impl Into<String>, body: F) -> Self {
        Self::create(Some(name.into()), body)
    }

    fn create(name: Option<String>, body: F) -> Self {
        let provider = NativeProvider::instance();
        let parent = provider.current();
        let context = provider.tracker().lightweight_created(&parent, name);
        Self { context, body }
    }

    /// The context this fiber runs in.
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Run the body inside the fiber's context and return its result.
    pub fn resume(self) -> R {
        let _guard = super::enter_lightweight(self.context);
        (self.body)()
    }
}

impl<F> fmt::Debug for Fiber<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("context", &self.context.id())
            .finish_non_exhaustive()
    }
}

/// Create a fiber and resume it immediately.
pub fn run<F, R>(body: F) -> R
where
    F: FnOnce() -> R,
{
    Fiber::new(body).resume()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native;

    #[test]
    fn test_fiber_is_current_while_running() {
        let thread = native::current();
        let fiber = Fiber::new(native::current);
        let fiber_id = fiber.context().id();

        let seen = fiber.resume();
        assert_eq!(seen.id(), fiber_id);
        assert!(seen.is_lightweight());
        assert_eq!(seen.parent().map(|p| p.id()), Some(thread.id()));
        assert_eq!(native::current().id(), thread.id());
    }

    #[test]
    fn test_nested_fibers_chain() {
        let (outer, inner_parent) = run(|| {
            let outer = native::current();
            run(move || (outer.id(), native::current().parent().map(|p| p.id())))
        });
        assert_eq!(inner_parent, Some(outer));
    }

    #[test]
    fn test_parent_captured_at_creation_not_resume() {
        let thread = native::current();
        let created_outside = Fiber::named("deferred", native::current);
        let parent = run(move || created_outside.resume().parent().map(|p| p.id()));
        assert_eq!(parent, Some(thread.id()));
    }

    #[test]
    fn test_previous_context_restored_after_panic() {
        let thread = native::current().id();
        let result = std::panic::catch_unwind(|| run::<_, ()>(|| panic!("fiber failed")));
        assert!(result.is_err());
        assert_eq!(native::current().id(), thread);
    }
}
