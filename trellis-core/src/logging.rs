//! Logging configuration for Trellis
//!
//! Structured logging built on `tracing`. Defaults to a compact
//! human-readable format on stdout; JSON output is available for
//! production log pipelines. The filter honors `RUST_LOG` when set.

use tracing_subscriber::{fmt, EnvFilter};

// Re-export the tracing macros so framework and application code share
// one logging surface.
pub use tracing::{debug, error, info, trace, warn};

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact single-line output for development.
    #[default]
    Compact,
    /// Pretty multi-line output.
    Pretty,
    /// JSON lines for structured log collection.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Include the event's module target.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// Install the global subscriber.
    ///
    /// Safe to call more than once; later calls are ignored so tests can
    /// initialize logging independently.
    pub fn init(self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.clone()));

        let builder = fmt()
            .with_env_filter(filter)
            .with_target(self.with_target);

        let result = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        if result.is_err() {
            debug!("Global tracing subscriber already installed");
        }
    }
}
