//! Diagnostics go to stderr. Stdout belongs to the protocol.

use std::io;
use tracing_subscriber::EnvFilter;

/// The filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install a stderr subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
