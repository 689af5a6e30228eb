//! logging
//!
//! `tracing` subscriber initialisation.
//!
//! Filter precedence: `RUST_LOG`, then the configured `log_filter`, then
//! `debug` when `--debug` is given, else `warn`. Logs go to stderr; ANSI
//! colors are disabled when `NO_COLOR` is set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pick the filter directive used when `RUST_LOG` is unset.
pub fn default_directive(config_filter: Option<&str>, debug: bool) -> &str {
    match config_filter {
        Some(filter) => filter,
        None if debug => "debug",
        None => "warn",
    }
}

/// Install the global subscriber.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(config_filter: Option<&str>, debug: bool) {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(value) if !value.is_empty() => EnvFilter::new(value),
        _ => EnvFilter::new(default_directive(config_filter, debug)),
    };

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(debug)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(env_filter)
        .try_init();
}
