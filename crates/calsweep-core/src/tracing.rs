//! Logging for calsweep
//!
//! A run logs one line per processed event. Those lines are the progress
//! report, so they go to stderr and leave stdout to the closing summary.
//!
//! ```ignore
//! use calsweep_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli()).expect("failed to initialize tracing");
//! ```
//!
//! `RUST_LOG` wins over the configured level when it is set.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("a tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// How each log line is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, indented fields
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for TracingOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?} (pretty, compact, json)")),
        }
    }
}

/// How much context surrounds each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDetail {
    /// Level and message only.
    Terse,
    /// Adds timestamp, module path and source location.
    Full,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for calsweep crates when neither `filter` nor `RUST_LOG` is set.
    pub level: Level,
    pub format: TracingOutputFormat,
    pub detail: LineDetail,
    /// Explicit filter directive, e.g. `calsweep_providers=trace`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::cli()
    }
}

impl TracingConfig {
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Compact,
            detail: LineDetail::Terse,
            filter: None,
        }
    }

    /// `--debug`: debug level with full line context.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            detail: LineDetail::Full,
            ..Self::cli()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(directive) = &self.filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("calsweep={}", self.level))))
    }
}

/// Installs the global subscriber. Call once, before the first log line.
///
/// # Errors
///
/// Fails when a subscriber is already installed or the filter directive does
/// not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.build_filter()?;
    let full = config.detail == LineDetail::Full;

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(full)
        .with_line_number(full)
        .with_target(full);

    let layer = match (config.format, full) {
        (TracingOutputFormat::Pretty, _) => layer.pretty().boxed(),
        (TracingOutputFormat::Json, _) => layer.json().boxed(),
        (TracingOutputFormat::Compact, true) => layer.compact().boxed(),
        (TracingOutputFormat::Compact, false) => layer.compact().without_time().boxed(),
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))?;
    Ok(())
}
