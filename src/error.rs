//! Top-level error types
//!
//! Startup failures (configuration, HTTP client construction, registry setup)
//! are fatal and surface as [`AppError`]. Everything that happens inside a
//! chat turn is reported to the user instead.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Errors that terminate the process before the chat loop starts
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] crate::http::HttpError),

    #[error("Tool setup error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for startup operations
pub type AppResult<T> = Result<T, AppError>;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*[^\s&]+").expect("valid secret pattern")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid path pattern")
});

const MAX_MESSAGE_LEN: usize = 500;

/// Redact credentials and cap length before a message reaches the model
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}
