//! Tracing initialisation for the evaluation binaries.
//!
//! The CLI prints the aggregate line IU as the only thing on stdout so that
//! scripts can capture it with `$(lineseg-eval ...)`. Every log line, per-item
//! scorer progress included, is therefore written to stderr.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global stderr subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json`, each event becomes one
/// JSON object per line, which keeps per-item `scorer finished` events
/// machine-readable for long batches. Only the first call installs anything.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
