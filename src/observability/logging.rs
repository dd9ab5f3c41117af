//! # Structured Logging
//!
//! `tracing-subscriber` setup for the binary. The library only emits events and spans;
//! installing a subscriber is left to whoever embeds it.
//!
//! `RUST_LOG` takes precedence over the configured level. In JSON mode every event
//! carries the fields of its enclosing span, so the `request_id` recorded on a sign
//! span shows up on all events of that call.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset, e.g. `info` or `vault_issuer=debug`
    pub level: String,
    /// Emit newline delimited JSON instead of human readable lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl LoggingConfig {
    /// Settings for the CLI verbosity flag.
    pub fn for_verbosity(verbose: bool, json: bool) -> Self {
        let level = if verbose { "debug" } else { "info" };
        Self { level: level.to_string(), json }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (e.g. by a test harness),
/// in which case the existing one is kept.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let result = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    result.is_ok()
}
