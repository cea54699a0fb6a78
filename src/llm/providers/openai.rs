//! OpenAI-compatible chat completions provider
//!
//! Works against any endpoint speaking the `/chat/completions` protocol with
//! function tools; the base URL comes from configuration.

use crate::config::LlmSection;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    MessageRole, TokenUsage, ToolDefinition,
};
use crate::tools::ToolCallRequest;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&LlmSection> for OpenAiConfig {
    fn from(section: &LlmSection) -> Self {
        Self {
            api_key: section.api_key.clone(),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OpenAI API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.without_url().to_string()))?;

        Ok(Self { config, client })
    }

    /// Estimate token count for messages (pure function)
    fn estimate_token_count(messages: &[OpenAiMessage]) -> usize {
        messages
            .iter()
            .map(|m| m.content.as_ref().map(|c| c.len()).unwrap_or(0) / 4)
            .sum()
    }

    /// Convert completion request to OpenAI format (pure function)
    fn convert_request(request: &CompletionRequest) -> OpenAiCompletionRequest {
        let tools: Vec<OpenAiTool> = request.tools.iter().map(Self::convert_tool).collect();

        OpenAiCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools: (!tools.is_empty()).then_some(tools),
        }
    }

    /// Parse OpenAI completion response (pure function)
    fn parse_completion_response(
        openai_response: OpenAiCompletionResponse,
    ) -> Result<CompletionResponse, LlmError> {
        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No choices returned from OpenAI".to_string())
        })?;

        let usage = TokenUsage {
            prompt_tokens: openai_response.usage.prompt_tokens,
            completion_tokens: openai_response.usage.completion_tokens,
            total_tokens: openai_response.usage.total_tokens,
        };

        let tool_calls = choice
            .message
            .tool_calls
            .as_deref()
            .map(Self::extract_tool_calls)
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            model: openai_response.model,
            usage,
            finish_reason: Self::convert_finish_reason(choice.finish_reason.as_deref()),
            tool_calls,
        })
    }

    /// Extract tool calls from OpenAI format (pure function)
    ///
    /// Arguments that are not valid JSON are kept as a string so that
    /// validation rejects them and the model sees why.
    fn extract_tool_calls(calls: &[OpenAiToolCall]) -> Vec<ToolCallRequest> {
        calls
            .iter()
            .map(|call| {
                let raw = call.function.arguments.trim();
                let arguments = if raw.is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str::<Value>(raw).unwrap_or_else(|e| {
                        warn!(tool = %call.function.name, "Failed to parse tool call arguments: {}", e);
                        Value::String(raw.to_string())
                    })
                };

                ToolCallRequest {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments,
                }
            })
            .collect()
    }

    /// Convert OpenAI finish reason to internal format (pure function)
    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }

    /// Convert internal message to OpenAI format (pure function)
    fn convert_message(message: &Message) -> OpenAiMessage {
        let tool_calls = (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .iter()
                .map(|call| OpenAiToolCall {
                    id: call.id.clone(),
                    call_type: "function".to_string(),
                    function: OpenAiFunctionCall {
                        name: call.name.clone(),
                        arguments: match &call.arguments {
                            Value::String(raw) => raw.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect()
        });

        OpenAiMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    /// Convert tool definition to OpenAI tool format (pure function)
    fn convert_tool(tool: &ToolDefinition) -> OpenAiTool {
        OpenAiTool {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let openai_request = Self::convert_request(&request);

        let estimated_tokens = Self::estimate_token_count(&openai_request.messages);
        self.log_request_info(&openai_request, estimated_tokens);

        self.complete_with_retry(&openai_request).await
    }
}

impl OpenAiProvider {
    /// Log request information (impure)
    fn log_request_info(&self, request: &OpenAiCompletionRequest, estimated_tokens: usize) {
        debug!(
            model = %request.model,
            tools = request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "OpenAI request: {} messages, estimated ~{} tokens",
            request.messages.len(),
            estimated_tokens
        );

        if estimated_tokens > 120_000 {
            warn!(
                "Large request detected: estimated {} tokens, may exceed model limits",
                estimated_tokens
            );
        }
    }

    /// Retry orchestrator - handles only I/O and retry logic (impure)
    async fn complete_with_retry(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let backoff_delays = [100u64, 200, 300];
        let mut last_error = None;

        for (attempt, &delay_ms) in std::iter::once(&0u64)
            .chain(backoff_delays.iter())
            .enumerate()
        {
            if attempt > 0 {
                debug!("OpenAI retry attempt {} after {}ms delay", attempt, delay_ms);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(openai_request).await {
                Ok(openai_response) => {
                    if attempt > 0 {
                        debug!("OpenAI request succeeded after {} retries", attempt);
                    }

                    let response = Self::parse_completion_response(openai_response)?;
                    self.log_response_info(&response);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("OpenAI request attempt {} failed: {}", attempt + 1, e);
                    if !Self::should_retry(&e) {
                        error!("Non-retryable API error, aborting: {}", e);
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!("OpenAI request failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    /// Make single API request (impure I/O)
    async fn make_api_request(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<OpenAiCompletionResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(openai_request)
            .send()
            .await
            .map_err(|e| {
                let (is_connect, is_timeout) = (e.is_connect(), e.is_timeout());
                let error_msg = format!(
                    "HTTP request failed: {} (is_connect: {is_connect}, is_timeout: {is_timeout})",
                    e.without_url()
                );
                warn!("OpenAI network error details: {}", error_msg);
                LlmError::NetworkError(error_msg)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))
    }

    /// Map a failed status to an error variant (pure function)
    fn classify_status(status: StatusCode, body: &str) -> LlmError {
        if body.contains("maximum context length") || body.contains("too many tokens") {
            warn!("Token limit exceeded - conversation may be too long");
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                LlmError::AuthenticationFailed(format!("OpenAI API error: {status} - {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                LlmError::RateLimitExceeded(format!("OpenAI API error: {status} - {body}"))
            }
            s if s.is_server_error() => {
                LlmError::ApiError(format!("OpenAI API server error: {status} - {body}"))
            }
            _ => LlmError::ApiError(format!("OpenAI API error: {status} - {body}")),
        }
    }

    /// Check if error should trigger retry (pure)
    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::NetworkError(_) | LlmError::RateLimitExceeded(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            _ => false,
        }
    }

    /// Log response information (impure)
    fn log_response_info(&self, response: &CompletionResponse) {
        debug!(
            "OpenAI response: {} tokens used (prompt: {}, completion: {}), finish_reason: {:?}, tool_calls: {}",
            response.usage.total_tokens,
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.finish_reason,
            response.tool_calls.len()
        );
    }
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_with_history() -> CompletionRequest {
        let call = ToolCallRequest {
            id: "call_1".to_string(),
            name: "geocode".to_string(),
            arguments: json!({"city": "Paris"}),
        };

        CompletionRequest {
            messages: vec![
                Message::system("You are helpful."),
                Message::user("Where is Paris?"),
                Message::assistant_tool_calls(None, vec![call]),
                Message::tool("call_1", "{\"status\":\"ok\",\"lat\":48.85}"),
            ],
            model: "gpt-4o".to_string(),
            max_tokens: None,
            temperature: Some(0.2),
            tools: vec![ToolDefinition {
                name: "geocode".to_string(),
                description: "Find a city".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
        }
    }

    #[test]
    fn test_openai_config_default() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_openai_config_from_llm_section() {
        let section = LlmSection {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:11434/v1/".to_string(),
            ..Default::default()
        };
        let config = OpenAiConfig::from(&section);
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.api_key, "sk-test");
    }

    #[test]
    fn test_openai_provider_creation_without_api_key() {
        let result = OpenAiProvider::new(OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_convert_request_carries_tool_messages() {
        let converted = OpenAiProvider::convert_request(&request_with_history());
        let json = serde_json::to_value(&converted).unwrap();

        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["messages"][2]["tool_calls"][0]["function"]["name"], "geocode");
        assert_eq!(
            json["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"city\":\"Paris\"}"
        );
        assert_eq!(json["messages"][3]["role"], "tool");
        assert_eq!(json["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tool_choice"], "auto");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_convert_request_without_tools_omits_tool_fields() {
        let mut request = request_with_history();
        request.tools.clear();
        let json = serde_json::to_value(OpenAiProvider::convert_request(&request)).unwrap();

        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }

    #[test]
    fn test_extract_tool_calls_keeps_malformed_arguments() {
        let calls = vec![
            OpenAiToolCall {
                id: "a".to_string(),
                call_type: "function".to_string(),
                function: OpenAiFunctionCall {
                    name: "geocode".to_string(),
                    arguments: "{\"city\": \"Oslo\"}".to_string(),
                },
            },
            OpenAiToolCall {
                id: "b".to_string(),
                call_type: "function".to_string(),
                function: OpenAiFunctionCall {
                    name: "geocode".to_string(),
                    arguments: "{not json".to_string(),
                },
            },
            OpenAiToolCall {
                id: "c".to_string(),
                call_type: "function".to_string(),
                function: OpenAiFunctionCall {
                    name: "geocode".to_string(),
                    arguments: String::new(),
                },
            },
        ];

        let extracted = OpenAiProvider::extract_tool_calls(&calls);
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted[0].arguments, json!({"city": "Oslo"}));
        assert_eq!(extracted[1].arguments, json!("{not json"));
        assert_eq!(extracted[2].arguments, json!({}));
    }

    #[test]
    fn test_finish_reason_conversion() {
        assert_eq!(OpenAiProvider::convert_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(
            OpenAiProvider::convert_finish_reason(Some("tool_calls")),
            FinishReason::ToolCalls
        );
        assert_eq!(OpenAiProvider::convert_finish_reason(Some("length")), FinishReason::Length);
        assert_eq!(OpenAiProvider::convert_finish_reason(None), FinishReason::Error);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            OpenAiProvider::classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            LlmError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            LlmError::RateLimitExceeded(_)
        ));
        let server = OpenAiProvider::classify_status(StatusCode::BAD_GATEWAY, "");
        assert!(OpenAiProvider::should_retry(&server));
        let client = OpenAiProvider::classify_status(StatusCode::BAD_REQUEST, "");
        assert!(!OpenAiProvider::should_retry(&client));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let response = OpenAiCompletionResponse {
            model: "gpt-4o".to_string(),
            choices: vec![],
            usage: OpenAiUsage::default(),
        };
        assert!(matches!(
            OpenAiProvider::parse_completion_response(response),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
