//! Diagnostic tracing for the framework itself.
//!
//! Test outcomes are delivered through the [`Reporter`](crate::reporter::Reporter);
//! this module only configures where `tracing` events go.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr in compact
/// format. Calling it again after a subscriber is installed is a no-op.
///
/// # Example
/// ```bash
/// RUST_LOG=treetest=debug cargo test
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
