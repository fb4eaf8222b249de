#![deny(unsafe_code)]

//! Context-scoped attributes with ancestor inheritance.
//!
//! Every heavyweight context (an OS thread) and lightweight context (a fiber
//! or async task) owns a copy-on-write [`LocalStore`]. Writes always land in
//! the current context. Reads go through the [`Resolver`], which can fall
//! back to the stores of ancestor contexts and compute a default when the
//! whole chain is empty.
//!
//! ```ignore
//! use lineage_core::{native, Attribute, Policy};
//!
//! let locale: Attribute<String> =
//!     Attribute::native("Settings", "locale", Policy::new().inherit(true));
//! locale.set("fr".into());
//!
//! let seen = native::thread::spawn(move || locale.get()).join().unwrap();
//! assert_eq!(seen.as_deref(), Some("fr"));
//! ```
//!
//! The host runtime is abstracted behind [`ExecutionContextProvider`]; the
//! [`native`] module provides one for std threads, fibers and tokio tasks.

/// Typed attribute handles.
pub mod attribute;
/// Execution context identity and kinds.
pub mod context;
/// Attribute access errors.
pub mod error;
/// Tracing subscriber setup.
pub mod logging;
/// Built-in provider for threads, fibers and tokio tasks.
pub mod native;
/// Resolution policies and default factories.
pub mod policy;
/// The host runtime seam and the manual provider.
pub mod provider;
/// Owner-keyed accessor tables.
pub mod registry;
/// Inheritance-aware reads and context-local writes.
pub mod resolver;
/// Per-context copy-on-write storage.
pub mod store;
/// Parent capture for new contexts.
pub mod tracker;

pub use attribute::Attribute;
pub use context::{ContextId, ContextKind, ExecutionContext};
pub use error::{AccessorHalf, AttributeError};
pub use native::{HierarchyError, NativeProvider};
pub use policy::{DefaultFactory, FactoryError, Policy, PolicyKind};
pub use provider::{ExecutionContextProvider, ManualProvider};
pub use registry::{
    Accessors, AttributeHandle, AttributeInfo, AttributeOptions, AttributeRegistry, ConfigurationError,
    OwnerAccessors, Visibility,
};
pub use resolver::{Resolution, Resolver, Source};
pub use store::{ContextKey, KEY_SEPARATOR, LocalStore, Value};
pub use tracker::HierarchyTracker;

pub use lineage_macros::lineage_attrs;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
