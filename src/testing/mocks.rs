//! Mock implementations for testing
//!
//! [`StubAdapter`] stands in for the network under every tool wrapper and
//! [`ScriptedLlmProvider`] replays canned model responses, so the whole chat
//! loop can run without external services.

use crate::http::{HttpAdapter, HttpError, HttpRequest, RawResponse};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::tools::ToolCallRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type StubRoute = (String, Result<RawResponse, HttpError>);

/// HTTP adapter answering from canned responses keyed by URL fragment
///
/// Later registrations win over earlier ones for the same fragment. Requests
/// with no matching route fail with a transport error.
#[derive(Debug, Default)]
pub struct StubAdapter {
    routes: Mutex<Vec<StubRoute>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url_fragment: impl Into<String>, outcome: Result<RawResponse, HttpError>) {
        lock(&self.routes).push((url_fragment.into(), outcome));
    }

    pub fn respond_json(&self, url_fragment: impl Into<String>, body: Value) {
        let mut response = RawResponse::new(200, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        self.respond(url_fragment, Ok(response));
    }

    pub fn respond_html(&self, url_fragment: impl Into<String>, status: u16, body: &str) {
        let mut response = RawResponse::new(status, body);
        response.headers.insert(
            "content-type".to_string(),
            "text/html; charset=utf-8".to_string(),
        );
        self.respond(url_fragment, Ok(response));
    }

    pub fn fail(&self, url_fragment: impl Into<String>, error: HttpError) {
        self.respond(url_fragment, Err(error));
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl HttpAdapter for StubAdapter {
    async fn call(&self, request: HttpRequest) -> Result<RawResponse, HttpError> {
        let outcome = lock(&self.routes)
            .iter()
            .rev()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, outcome)| outcome.clone());
        let url = request.url.clone();
        lock(&self.requests).push(request);

        match outcome {
            Some(Ok(response)) if !(200..300).contains(&response.status) => {
                Err(HttpError::Remote {
                    status: response.status,
                    body: response.body,
                })
            }
            Some(outcome) => outcome,
            None => Err(HttpError::Transport(format!("no stub response for {url}"))),
        }
    }
}

/// LLM provider that replays a fixed script of responses
#[derive(Debug, Default)]
pub struct ScriptedLlmProvider {
    script: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose every call fails
    pub fn with_failure() -> Self {
        let provider = Self::default();
        provider.push_error(LlmError::RequestFailed("Mock LLM failure".to_string()));
        provider
    }

    pub fn push(&self, response: CompletionResponse) {
        lock(&self.script).push_back(Ok(response));
    }

    pub fn push_error(&self, error: LlmError) {
        lock(&self.script).push_back(Err(error));
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// A plain text answer
    pub fn reply(content: impl Into<String>) -> CompletionResponse {
        CompletionResponse {
            content: Some(content.into()),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            tool_calls: Vec::new(),
        }
    }

    /// A response requesting the given `(name, arguments)` calls
    pub fn call_tools(calls: Vec<(&str, Value)>) -> CompletionResponse {
        CompletionResponse {
            content: None,
            finish_reason: FinishReason::ToolCalls,
            tool_calls: calls
                .into_iter()
                .map(|(name, arguments)| ToolCallRequest::new(name, arguments))
                .collect(),
            ..Self::reply("")
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        lock(&self.requests).push(request);

        let mut script = lock(&self.script);
        let entry = script
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::RequestFailed("Mock script exhausted".to_string())));

        // a trailing error repeats, so a failing provider keeps failing
        if entry.is_err() && script.is_empty() {
            script.push_back(entry.clone());
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_stub_adapter_routes_by_fragment() {
        let stub = StubAdapter::new();
        stub.respond_json("geocoding", json!({"results": []}));
        stub.respond_json("geocoding", json!({"results": [1]}));

        let response = stub
            .call(HttpRequest::get("https://geocoding-api.open-meteo.com/v1/search"))
            .await
            .unwrap();
        assert_eq!(response.body, "{\"results\":[1]}");

        let missing = stub.call(HttpRequest::get("https://elsewhere.test")).await;
        assert!(matches!(missing, Err(HttpError::Transport(_))));
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stub_adapter_non_2xx_becomes_remote_error() {
        let stub = StubAdapter::new();
        stub.respond_html("example.com", 503, "down");

        let result = stub.call(HttpRequest::get("https://example.com/")).await;
        assert_eq!(
            result,
            Err(HttpError::Remote {
                status: 503,
                body: "down".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_scripted_provider_replays_in_order() {
        let provider = ScriptedLlmProvider::new(vec![
            ScriptedLlmProvider::call_tools(vec![("geocode", json!({"city": "Paris"}))]),
            ScriptedLlmProvider::reply("done"),
        ]);

        let first = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "geocode");

        let second = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("done"));

        assert!(provider.complete(CompletionRequest::default()).await.is_err());
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider_keeps_failing() {
        let provider = ScriptedLlmProvider::with_failure();
        assert!(provider.complete(CompletionRequest::default()).await.is_err());
        assert!(provider.complete(CompletionRequest::default()).await.is_err());
    }
}
