//! Logging configuration for console output.

use tracing_subscriber::EnvFilter;

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "signal_feeder=debug")
    pub level_filter: String,
    /// Whether to include timestamps in console output
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: "info,signal_feeder=info".to_string(),
            console_timestamps: true,
        }
    }
}

/// Initialize console logging. `RUST_LOG` overrides the configured filter.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.console_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
