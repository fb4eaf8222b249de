//! Unique names for attribute owners.
//!
//! Tests in one binary share the native provider's root context, so every
//! test that writes through it should use its own owner.

use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_OWNER: AtomicUsize = AtomicUsize::new(0);

/// An owner name no other call in this process returns, e.g. `Settings#3`.
pub fn unique_owner(prefix: &str) -> String {
    format!("{prefix}#{}", NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
}
