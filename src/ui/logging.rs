//! ui::logging
//!
//! Install the `tracing` subscriber.
//!
//! `RUST_LOG` wins when set. Otherwise the level follows the global flags:
//! `--debug` enables debug events, `--quiet` keeps only errors.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::output::Verbosity;

/// Default filter directive for `verbosity`.
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "info",
        Verbosity::Debug => "debug",
    }
}

/// Log to stderr without timestamps. A second call is a no-op.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}
