//! Logging setup for the agent binary.
//!
//! Installs a `tracing` subscriber writing to stderr, filtered by
//! `RUST_LOG` (falling back to the given default directive).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Build the env filter, preferring `RUST_LOG` over `default_directive`
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize the global subscriber. Fails if one is already installed.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(stderr_layer)
        .try_init()
}
