//! Tests for logging configuration and format parsing
//!
//! Exercises the pure settings functions through the public API; the
//! environment is injected through a lookup closure.

use std::collections::HashMap;
use toolchat::observability::logging::{parse_level, LogFormat, LoggingSettings};
use tracing::Level;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_log_format_parse_json() {
    assert!(matches!(LogFormat::parse("json"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("JSON"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("Json"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_pretty() {
    assert!(matches!(LogFormat::parse("pretty"), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("PRETTY"), LogFormat::Pretty));
}

#[test]
fn test_log_format_parse_invalid_defaults_to_compact() {
    // Unknown formats fall back to the terminal-friendly format
    assert!(matches!(LogFormat::parse("invalid"), LogFormat::Compact));
    assert!(matches!(LogFormat::parse(""), LogFormat::Compact));
    assert!(matches!(LogFormat::parse("xml"), LogFormat::Compact));
}

#[test]
fn test_log_level_parsing() {
    assert_eq!(parse_level("error"), Level::ERROR);
    assert_eq!(parse_level("Warn"), Level::WARN);
    assert_eq!(parse_level("INFO"), Level::INFO);
    assert_eq!(parse_level("debug"), Level::DEBUG);
    assert_eq!(parse_level("trace"), Level::TRACE);
    assert_eq!(parse_level("verbose"), Level::WARN);
}

#[test]
fn test_chat_defaults_keep_stderr_quiet() {
    let settings = LoggingSettings::from_lookup(lookup(&[]), false);

    assert_eq!(settings.level, Level::WARN);
    assert_eq!(settings.format, LogFormat::Compact);
    assert!(settings.filter_directives().starts_with("warn,"));
}

#[test]
fn test_debug_mode_raises_level() {
    let settings = LoggingSettings::from_lookup(lookup(&[("LOG_LEVEL", "warn")]), true);
    assert_eq!(settings.level, Level::DEBUG);
}

#[test]
fn test_rust_log_takes_precedence() {
    let settings = LoggingSettings::from_lookup(
        lookup(&[("LOG_LEVEL", "info"), ("RUST_LOG", "toolchat=debug,reqwest=info")]),
        false,
    );

    assert_eq!(settings.filter_directives(), "toolchat=debug,reqwest=info");
}

#[test]
fn test_blank_rust_log_is_ignored() {
    let settings = LoggingSettings::from_lookup(lookup(&[("RUST_LOG", "  ")]), false);
    assert_eq!(settings.directives, None);
}
