//! Tracing initialisation for tests.
//!
//! The subscriber is installed at most once per process; later calls are
//! ignored, so every test may call these helpers.

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber at `info`, or at `RUST_LOG` if set.
///
/// ```ignore
/// #[test]
/// fn resolves_from_parent() {
///     lineage_test_utils::tracing_setup::init_test_tracing();
///     // RUST_LOG=lineage_core=trace shows every resolution step
/// }
/// ```
pub fn init_test_tracing() {
    init_test_tracing_at("info");
}

/// Like [`init_test_tracing`] with a different fallback level.
pub fn init_test_tracing_at(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_test_writer()
        .try_init();
}
