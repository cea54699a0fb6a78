//! Structured logging using the tracing crate
//!
//! Logs go to stderr so the conversation on stdout stays readable.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to WARN
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to compact
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! # Machine-readable logs next to the chat
//! LOG_FORMAT=json LOG_LEVEL=INFO toolchat 2> chat.log
//!
//! # Everything, including tool spans
//! LOG_SPANS=true toolchat --debug
//! ```

use std::env;
use std::io;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies that are chatty at DEBUG
const NOISY_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn", "article_scraper=warn", "html5ever=error"];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string; unknown values fall back to compact
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Resolved logging options
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
    /// Raw `RUST_LOG` directives, replacing the level filter when set
    pub directives: Option<String>,
}

impl LoggingSettings {
    /// Read settings through `lookup`; `debug` forces DEBUG level
    pub fn from_lookup<F>(lookup: F, debug: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = if debug {
            Level::DEBUG
        } else {
            lookup("LOG_LEVEL")
                .map(|l| parse_level(&l))
                .unwrap_or(Level::WARN)
        };

        Self {
            level,
            format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(LogFormat::Compact),
            include_spans: lookup("LOG_SPANS")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            directives: lookup("RUST_LOG").filter(|d| !d.trim().is_empty()),
        }
    }

    /// Filter directives for the subscriber (pure function)
    pub fn filter_directives(&self) -> String {
        match &self.directives {
            Some(directives) => directives.clone(),
            None => std::iter::once(self.level.to_string().to_lowercase())
                .chain(NOISY_TARGETS.iter().map(|t| t.to_string()))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Map a `LOG_LEVEL` value; unknown values fall back to WARN
pub fn parse_level(value: &str) -> Level {
    match value.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::WARN,
    }
}

/// Install the global subscriber; later calls are ignored
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::new(settings.filter_directives());
    let span_events = if settings.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match settings.format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_span_events(span_events),
            )
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_writer(io::stderr)
                    .with_span_events(span_events),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(io::stderr)
                    .with_span_events(span_events),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Initialize logging from environment variables
pub fn init_default_logging(debug: bool) {
    init_logging(&LoggingSettings::from_lookup(|key| env::var(key).ok(), debug));
}

/// Create a tool execution span
#[macro_export]
macro_rules! tool_span {
    ($($field:tt)*) => {
        tracing::info_span!("tool_execution", $($field)*)
    };
}

/// Create a chat turn span
#[macro_export]
macro_rules! turn_span {
    ($($field:tt)*) => {
        tracing::info_span!("chat_turn", $($field)*)
    };
}

pub use {tool_span, turn_span};
