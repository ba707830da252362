//! Structured logging support
//!
//! The mappers emit `tracing` events (`debug!` per mapping with shapes and
//! worker counts, `trace!` per worker range). This module installs a
//! `tracing-subscriber` pipeline to print them.
//!
//! # Example
//!
//! ```ignore
//! use slicemap::tracing_support::{init_tracing, TracingConfig, TracingFormat};
//!
//! init_tracing(TracingConfig {
//!     format: TracingFormat::Compact,
//!     filter: "slicemap_exec=trace,info".to_string(),
//!     ..TracingConfig::default()
//! })?;
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., `RUST_LOG=slicemap_exec=debug`)
//! - `SLICEMAP_LOG_FORMAT`: Set output format (`json`, `compact` or `pretty`, default: `pretty`)
//!
//! Without the `tracing` feature [`init_tracing`] is a no-op.

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "SLICEMAP_LOG_FORMAT";

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "slicemap=info,slicemap_exec=info,slicemap_ad=info,warn";

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Pretty-printed human-readable format
    Pretty,
    /// JSON format for structured logging
    Json,
    /// Compact format (single line per event)
    Compact,
}

impl TracingFormat {
    /// Parse from string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => TracingFormat::Json,
            "compact" => TracingFormat::Compact,
            _ => TracingFormat::Pretty,
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format
    pub format: TracingFormat,
    /// Filter directive (e.g., "slicemap_exec=debug,info")
    pub filter: String,
    /// Enable ANSI colors
    pub with_ansi: bool,
    /// Show target module paths
    pub with_target: bool,
    /// Show thread names (workers are named `slicemap-worker-<n>`)
    pub with_thread_names: bool,
    /// Show file locations and line numbers
    pub with_file: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .map(|s| TracingFormat::parse(&s))
            .unwrap_or(TracingFormat::Pretty);
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        Self {
            format,
            filter,
            with_ansi: true,
            with_target: true,
            with_thread_names: true,
            with_file: false,
        }
    }
}

/// Install a global subscriber for `config`
///
/// Call once at application startup; fails if the filter does not parse or a
/// global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_tracing(config: TracingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;

    match config.format {
        TracingFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names)
                .with_file(config.with_file)
                .with_line_number(config.with_file)
                .with_filter(filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()?;
        }
        TracingFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names)
                .with_file(config.with_file)
                .with_line_number(config.with_file)
                .with_filter(filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()?;
        }
        TracingFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names)
                .with_file(config.with_file)
                .with_line_number(config.with_file)
                .with_filter(filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()?;
        }
    }

    tracing::debug!(format = ?config.format, filter = %config.filter, "tracing initialised");
    Ok(())
}

/// Stub for when the tracing feature is disabled
#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_config: TracingConfig) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_format_parse() {
        assert_eq!(TracingFormat::parse("json"), TracingFormat::Json);
        assert_eq!(TracingFormat::parse("JSON"), TracingFormat::Json);
        assert_eq!(TracingFormat::parse("compact"), TracingFormat::Compact);
        assert_eq!(TracingFormat::parse("pretty"), TracingFormat::Pretty);
        assert_eq!(TracingFormat::parse("unknown"), TracingFormat::Pretty);
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert!(config.with_ansi);
        assert!(config.with_target);
        assert!(!config.filter.is_empty());
    }

    #[cfg(not(feature = "tracing"))]
    #[test]
    fn test_stub_is_noop() {
        assert!(init_tracing(TracingConfig::default()).is_ok());
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn test_invalid_filter_rejected() {
        let config = TracingConfig {
            filter: "slicemap=notalevel[".to_string(),
            ..TracingConfig::default()
        };
        assert!(init_tracing(config).is_err());
    }
}
