//! Tracing initialisation for tests.
//!
//! The subscriber is installed at most once per process, so every test may
//! call [`init_test_tracing`] first thing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: gateway crates at `debug`.
pub const DEFAULT_TEST_FILTER: &str = "scapgate_core=debug,scapgate_config=debug,warn";

/// Install a subscriber writing through the test harness, filtered by
/// `RUST_LOG` or [`DEFAULT_TEST_FILTER`].
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     scapgate_test_utils::tracing_setup::init_test_tracing();
///     tracing::info!("captured per test");
/// }
/// ```
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
