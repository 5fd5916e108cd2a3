//! Tracing subscriber setup.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the caller supplies one.
pub const DEFAULT_FILTER: &str = "concierge=info";

/// Raised when the global subscriber cannot be installed.
#[derive(Debug, Error)]
#[error("failed to initialise tracing subscriber: {0}")]
pub struct TelemetryError(String);

/// Installs a formatting subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `fallback_filter`. Stdout is left
/// free for turn replies.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the fallback filter is malformed or a
/// global subscriber is already installed.
pub fn init(fallback_filter: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter))
        .map_err(|err| TelemetryError(err.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| TelemetryError(err.to_string()))
}
