//! Tool-invocation contract
//!
//! Every tool exposes a [`ToolSpec`] and an `execute` method taking validated
//! arguments. [`Tool::invoke`] wraps validation and execution and converts any
//! failure into a [`ToolResult::Error`], so a failing tool never takes the
//! chat loop down with it. The [`ToolRegistry`] owns the ordered set of tools
//! and dispatches [`ToolCallRequest`]s by name.

use crate::error::sanitize_error_message;
use crate::http::HttpError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn, Instrument};

pub mod builtin;
pub mod schema;

pub use schema::{parse_params, validate_arguments, ParamSpec, ParamType, ToolSpec};

/// Flat payload produced by a successful tool call
pub type Payload = Map<String, Value>;

/// Tool interface
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and parameter schema
    fn spec(&self) -> &ToolSpec;

    /// Run the tool with arguments already validated against `spec()`
    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError>;

    /// Validate, execute and normalize into a [`ToolResult`]
    async fn invoke(&self, arguments: &Value) -> ToolResult {
        let name = self.spec().name.clone();
        let outcome = async {
            let validated = validate_arguments(self.spec(), arguments)?;
            self.execute(validated).await
        }
        .instrument(crate::tool_span!(tool = %name))
        .await;

        match outcome {
            Ok(payload) => {
                debug!(tool = %name, keys = payload.len(), "Tool completed");
                ToolResult::Ok(payload)
            }
            Err(e) => {
                warn!(tool = %name, kind = ?e.kind(), "Tool failed: {}", e);
                ToolResult::from(e)
            }
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Error categories surfaced in tool results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Validation,
    Transport,
    Remote,
    Decode,
    UnknownTool,
    Registration,
    NoResults,
    Configuration,
}

/// Tool system errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Remote service returned status {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool registration failed: {0}")]
    Registration(String),
    #[error("{0}")]
    NoResults(String),
    #[error("Tool not configured: {0}")]
    Configuration(String),
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::Validation(_) => ToolErrorKind::Validation,
            ToolError::Transport(_) => ToolErrorKind::Transport,
            ToolError::Remote { .. } => ToolErrorKind::Remote,
            ToolError::Decode(_) => ToolErrorKind::Decode,
            ToolError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            ToolError::Registration(_) => ToolErrorKind::Registration,
            ToolError::NoResults(_) => ToolErrorKind::NoResults,
            ToolError::Configuration(_) => ToolErrorKind::Configuration,
        }
    }
}

impl From<HttpError> for ToolError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Transport(msg) => ToolError::Transport(msg),
            HttpError::Remote { status, body } => ToolError::Remote { status, body },
            HttpError::Decode(msg) => ToolError::Decode(msg),
        }
    }
}

/// Normalized outcome of a tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Ok(Payload),
    Error { kind: ToolErrorKind, message: String },
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolResult::Ok(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            ToolResult::Ok(_) => "ok",
            ToolResult::Error { .. } => "error",
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            ToolResult::Ok(payload) => Some(payload),
            ToolResult::Error { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ToolResult::Ok(_) => None,
            ToolResult::Error { message, .. } => Some(message),
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            ToolResult::Ok(_) => None,
            ToolResult::Error { kind, .. } => Some(*kind),
        }
    }

    /// Wire form fed back into the conversation
    pub fn to_json(&self) -> Value {
        match self {
            ToolResult::Ok(payload) => {
                let mut object = Map::new();
                object.insert("status".to_string(), json!("ok"));
                object.extend(payload.clone());
                Value::Object(object)
            }
            ToolResult::Error { kind, message } => json!({
                "status": "error",
                "kind": kind,
                "message": message
            }),
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        ToolResult::Error {
            kind: error.kind(),
            message: sanitize_error_message(&error.to_string()),
        }
    }
}

type ToolFn = dyn Fn(Payload) -> Result<Payload, ToolError> + Send + Sync;

/// Tool backed by a plain closure
pub struct FnTool {
    spec: ToolSpec,
    handler: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Payload) -> Result<Payload, ToolError> + Send + Sync + 'static,
    {
        Self {
            spec,
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        (self.handler)(arguments)
    }
}

/// Ordered set of uniquely named tools
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry holding the seven builtin tools
    pub fn with_builtin_tools(
        services: &crate::config::ServicesSection,
        adapter: std::sync::Arc<dyn crate::http::HttpAdapter>,
    ) -> Result<Self, ToolError> {
        builtin::builtin_registry(services, adapter)
    }

    /// Add a tool; names must be unique and usable as function names
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.spec().name.clone();
        validate_tool_name(&name)?;
        tool.spec().validator().map_err(|e| {
            ToolError::Registration(format!("Tool '{name}' has an invalid schema: {e}"))
        })?;

        if self.index.contains_key(&name) {
            return Err(ToolError::Registration(format!(
                "Tool '{name}' is already registered"
            )));
        }

        debug!("Registered tool: {}", name);
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register a spec together with a closure implementing it
    pub fn register_fn<F>(&mut self, spec: ToolSpec, handler: F) -> Result<(), ToolError>
    where
        F: Fn(Payload) -> Result<Payload, ToolError> + Send + Sync + 'static,
    {
        self.register(Box::new(FnTool::new(spec, handler)))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Specs in registration order
    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up the named tool and invoke it; unknown names become error results
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolResult {
        match self.get(&request.name) {
            Some(tool) => tool.invoke(&request.arguments).await,
            None => {
                warn!(tool = %request.name, "Model requested an unregistered tool");
                ToolResult::from(ToolError::UnknownTool(format!(
                    "'{}'. Available tools: {}",
                    request.name,
                    self.list_tools().join(", ")
                )))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Function names must match [a-zA-Z0-9_-]{1,64}
fn validate_tool_name(name: &str) -> Result<(), ToolError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if name.is_empty() || name.len() > 64 || !valid_chars {
        return Err(ToolError::Registration(format!(
            "Tool name '{name}' must match pattern [a-zA-Z0-9_-]{{1,64}}"
        )));
    }

    Ok(())
}
