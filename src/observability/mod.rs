//! Observability
//!
//! Structured logging setup and span macros for tool calls and chat turns.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat, LoggingSettings};

// Span macros for structured logging
pub use logging::{tool_span, turn_span};
