//! Structured logging.
//!
//! `RUST_LOG` takes precedence over the default filter. Colour is turned
//! off when requested on the command line.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "service_supervisor=info,tower_http=info";

/// Logging settings known before any configuration is read.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Strip ANSI colour codes.
    pub disable_color: bool,
    /// Filter directive overriding [`DEFAULT_FILTER`].
    pub filter: Option<String>,
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(!config.disable_color))
        .try_init()
}
