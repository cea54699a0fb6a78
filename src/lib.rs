//! Toolchat - a tool-calling chat assistant
//!
//! A small command-line assistant that lets a chat model call a fixed set of
//! HTTP-backed tools: geocoding, weather, web search, page fetching, YouTube
//! search, Google Scholar search and Google Flights search.
//!
//! # Overview
//!
//! - [`tools`]: the tool-invocation contract, parameter validation, the
//!   registry and the builtin tool wrappers
//! - [`http`]: the transport boundary every tool goes through
//! - [`llm`]: the chat model provider abstraction and an OpenAI-compatible
//!   implementation
//! - [`chat`]: conversation state, the per-turn loop and the console REPL
//!
//! # Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use toolchat::tools::{ParamSpec, ParamType, ToolCallRequest, ToolRegistry, ToolSpec};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut registry = ToolRegistry::new();
//! registry
//!     .register_fn(
//!         ToolSpec::new("shout", "Upper-case some text")
//!             .param(ParamSpec::required("text", ParamType::String, "Text to shout")),
//!         |mut args| {
//!             let text = args["text"].as_str().unwrap_or_default().to_uppercase();
//!             args.insert("text".to_string(), json!(text));
//!             Ok(args)
//!         },
//!     )
//!     .unwrap();
//!
//! let result = registry
//!     .dispatch(&ToolCallRequest::new("shout", json!({"text": "hello"})))
//!     .await;
//! assert_eq!(result.payload().unwrap()["text"], "HELLO");
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod observability;
pub mod testing;
pub mod tools;

pub use chat::{ChatError, ChatSession, SessionSettings};
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, AppResult};
pub use tools::{Tool, ToolError, ToolRegistry, ToolResult, ToolSpec};
