//! Tracing setup for hosts and tests

use tracing_subscriber::EnvFilter;

/// Install a global subscriber honoring `RUST_LOG`. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
