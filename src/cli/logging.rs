//! Logging setup for the CLI
//!
//! Installs a `tracing-subscriber` formatter on stderr. `RUST_LOG` takes
//! precedence over the level derived from `-v` flags.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// JSON lines for machine parsing
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for this crate when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Map a `-v` count to a level: 0 info, 1 debug, 2+ trace
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    /// Set output format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Other crates stay at warn
            EnvFilter::new(format!(
                "warn,tea_ingest={}",
                self.level.as_str().to_lowercase()
            ))
        })
    }
}

/// Install the global subscriber
///
/// Returns false when a subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.filter());

    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.is_ok()
}
