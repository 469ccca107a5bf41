//! Structured logging setup
//!
//! The library only emits `tracing` events; installing a subscriber is left to the
//! application. [`init_logging`] installs the usual one: an [`EnvFilter`] driven by
//! `RUST_LOG` (falling back to `BRRTMUX_LOG_LEVEL`, then `info`) and a JSON or pretty
//! formatter selected by `BRRTMUX_LOG_FORMAT`.

use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the installed formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => anyhow::bail!("unknown log format '{other}'"),
        }
    }
}

/// Logging settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Extra comma-separated filter directives, e.g. `brrtmux::router=debug`
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            directives: None,
        }
    }
}

impl LogConfig {
    /// Read `BRRTMUX_LOG_LEVEL`, `BRRTMUX_LOG_FORMAT` and `BRRTMUX_LOG_FILTER`
    ///
    /// Unset or unparsable values keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            level: lookup("BRRTMUX_LOG_LEVEL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.level),
            format: lookup("BRRTMUX_LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
            directives: lookup("BRRTMUX_LOG_FILTER").filter(|v| !v.trim().is_empty()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        if let Some(directives) = &self.directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(e) => eprintln!("Warning: invalid log filter directive '{directive}': {e}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber configured from the environment
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LogConfig::from_env())
}

/// Install the global subscriber with explicit settings
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")
}
