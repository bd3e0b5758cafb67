//! Tracing and logging support.
//!
//! The host crates emit `tracing` events (activation milestones at `info`,
//! gate decisions and module loads at `debug`). This module installs a
//! subscriber for them.

#[cfg(feature = "tracing")]
pub use tracing::{self, debug, error, info, instrument, trace, warn};

#[cfg(feature = "tracing")]
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "CAVIAR_LOG_FORMAT";

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable, multi-line.
    Pretty,

    /// One line per event (default).
    #[default]
    Compact,

    /// JSON lines, for log collectors.
    Json,
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Tracing configuration.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG or defaults to "info".
    pub level: Option<tracing::Level>,

    pub format: TracingFormat,

    pub timestamps: bool,

    /// Include target module names in output.
    pub target: bool,
}

#[cfg(feature = "tracing")]
impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: true,
            target: true,
        }
    }
}

#[cfg(feature = "tracing")]
impl TracingConfig {
    /// Defaults, with the format taken from `CAVIAR_LOG_FORMAT` when it parses
    pub fn from_env() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self {
            format,
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

/// Initialize tracing subscriber with default settings.
///
/// # Example
///
/// ```ignore
/// use caviar::tracing_support::init_subscriber;
///
/// #[tokio::main]
/// async fn main() {
///     init_subscriber();
///     // activate and run
/// }
/// ```
///
/// # Environment Variables
///
/// - `RUST_LOG=caviar_plugin_host=debug` - Show gate decisions and module loads
/// - `CAVIAR_LOG_FORMAT=json` - JSON output
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    init_subscriber_with_config(TracingConfig::from_env());
}

/// Initialize tracing subscriber with custom configuration.
///
/// Panics if a global subscriber is already set; see
/// [`try_init_subscriber_with_config`].
#[cfg(feature = "tracing")]
pub fn init_subscriber_with_config(config: TracingConfig) {
    if let Err(e) = try_init_subscriber_with_config(config) {
        panic!("failed to install tracing subscriber: {}", e);
    }
}

/// Like [`init_subscriber_with_config`], failing instead of panicking
/// when a global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn try_init_subscriber_with_config(config: TracingConfig) -> Result<(), TryInitError> {
    let filter = config.filter();

    let layer = tracing_subscriber::fmt::layer().with_target(config.target);
    let layer = match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => layer.pretty().boxed(),
        (TracingFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        (TracingFormat::Compact, true) => layer.compact().boxed(),
        (TracingFormat::Compact, false) => layer.compact().without_time().boxed(),
        (TracingFormat::Json, true) => layer.json().boxed(),
        (TracingFormat::Json, false) => layer.json().without_time().boxed(),
    };

    tracing_subscriber::registry().with(layer).with(filter).try_init()
}

// Fallback when tracing feature is disabled
#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}
