//! Logging initialization shared by the three CLI binaries.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{QservError, Result};

/// Initialize a stdout-targeted `tracing` subscriber.
///
/// `verbose` maps to `DEBUG`, otherwise `INFO`. Respects `RUST_LOG` if set,
/// falling back to a level-scoped `qserv=` filter directive.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("qserv={level}")))
        .map_err(|e| QservError::config(format!("failed to build log filter: {e}")))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| QservError::config(format!("logging already initialized: {e}")))
}
