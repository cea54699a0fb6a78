//! Shared SerpAPI access for the search-style tools
//!
//! Web, video, scholar and flight search all go through the same endpoint
//! with a different `engine` parameter.

use crate::http::{HttpAdapter, HttpRequest};
use crate::tools::ToolError;
use serde_json::Value;
use std::sync::Arc;

/// SerpAPI endpoint plus optional key
#[derive(Clone)]
pub struct SerpApiClient {
    adapter: Arc<dyn HttpAdapter>,
    endpoint: String,
    api_key: Option<String>,
}

impl SerpApiClient {
    pub fn new(adapter: Arc<dyn HttpAdapter>, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            adapter,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }

    /// Start a request for `engine`; fails when no key is configured
    pub fn request(&self, engine: &str) -> Result<HttpRequest, ToolError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::Configuration(
                "SERPAPI_API_KEY not found in environment variables. Please set this variable to use search tools."
                    .to_string(),
            )
        })?;

        Ok(HttpRequest::get(&self.endpoint)
            .query("engine", engine)
            .query("api_key", api_key))
    }

    /// Perform the search and return the decoded JSON body
    pub async fn search(&self, request: HttpRequest) -> Result<Value, ToolError> {
        let response = self.adapter.call(request).await?;
        let body: Value = response.json()?;
        check_error_field(&body, response.status)?;
        Ok(body)
    }
}

/// SerpAPI reports some failures in an `error` field of a 200 response
fn check_error_field(body: &Value, status: u16) -> Result<(), ToolError> {
    match body.get("error").and_then(Value::as_str) {
        Some(message) if message.contains("any results") => {
            Err(ToolError::NoResults(message.to_string()))
        }
        Some(message) => Err(ToolError::Remote {
            status,
            body: message.to_string(),
        }),
        None => Ok(()),
    }
}

/// Render a field as display text; objects with a `name` use it
pub fn text(value: &Value, key: &str) -> String {
    value.get(key).map(value_text).unwrap_or_default()
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => map.get("name").map(value_text).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Follow a path of object keys
pub fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}
