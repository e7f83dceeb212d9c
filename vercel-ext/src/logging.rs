//! Development-time tracing.
//!
//! Tracing goes to stderr and is filtered by `RUST_LOG`. Prompt text and the
//! CLI's own output never pass through it.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output: stderr, compact format.
/// Repeated calls are ignored.
///
/// # Example
/// ```bash
/// RUST_LOG=vercel_ext=debug vercel-pull-envs
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
