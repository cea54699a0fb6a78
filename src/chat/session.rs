//! Per-session chat loop
//!
//! Each user utterance drives the state machine
//! `AwaitingUserInput -> ModelTurn -> (DirectReply | ToolCallPending)`.
//! Tool calls are dispatched in order and their results appended to the
//! conversation before the model is asked again, up to `max_turns` model
//! calls per utterance.

use super::conversation::ConversationState;
use super::prompts::system_prompt;
use crate::config::LlmSection;
use crate::llm::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, ToolDefinition};
use crate::tools::{ToolCallRequest, ToolRegistry, ToolResult};
use chrono::Local;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, Instrument};

/// Where the loop is within the current user turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    AwaitingUserInput,
    ModelTurn,
    DirectReply,
    ToolCallPending,
}

/// Errors that end a user turn without a reply
#[derive(Debug, Error, PartialEq)]
pub enum ChatError {
    #[error("Model request failed: {0}")]
    Llm(#[from] LlmError),
    #[error("No final answer after {0} model turns")]
    MaxTurnsExceeded(usize),
}

/// Hooks for displaying tool activity as it happens
pub trait TurnObserver: Send {
    fn on_tool_call(&mut self, _call: &ToolCallRequest) {}

    fn on_tool_result(&mut self, _call: &ToolCallRequest, _result: &ToolResult) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// Model parameters for each completion request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_turns: usize,
}

impl From<&LlmSection> for SessionSettings {
    fn from(section: &LlmSection) -> Self {
        Self {
            model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            max_turns: section.max_turns,
        }
    }
}

/// One interactive conversation with the model and its tools
pub struct ChatSession {
    provider: Arc<dyn LlmProvider>,
    registry: ToolRegistry,
    settings: SessionSettings,
    conversation: ConversationState,
    state: ChatState,
    system_prompt: String,
    observer: Box<dyn TurnObserver>,
    user_turns: usize,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: ToolRegistry,
        settings: SessionSettings,
    ) -> Self {
        let system_prompt = system_prompt(&registry.specs(), &Local::now());
        Self {
            provider,
            registry,
            settings,
            conversation: ConversationState::new(),
            state: ChatState::AwaitingUserInput,
            system_prompt,
            observer: Box::new(NoopObserver),
            user_turns: 0,
        }
    }

    pub fn with_observer(mut self, observer: impl TurnObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Process one user utterance through to a final reply
    ///
    /// The session always returns to `AwaitingUserInput`, whether or not the
    /// turn produced a reply.
    pub async fn handle_user_turn(&mut self, input: &str) -> Result<String, ChatError> {
        self.user_turns += 1;
        let span = crate::turn_span!(
            session = %self.conversation.id(),
            turn = self.user_turns,
            provider = self.provider.name()
        );

        self.conversation.push_user(input);
        let outcome = self.run_model_loop().instrument(span).await;
        self.state = ChatState::AwaitingUserInput;
        outcome
    }

    async fn run_model_loop(&mut self) -> Result<String, ChatError> {
        for iteration in 1..=self.settings.max_turns {
            self.state = ChatState::ModelTurn;
            let request = self.create_completion_request();
            let response = self.provider.complete(request).await?;

            if !Self::should_continue_tool_loop(&response) {
                self.state = ChatState::DirectReply;
                let reply = Self::extract_final_content(&response);
                self.conversation.push_assistant(reply.clone());
                info!(iterations = iteration, "Model produced a final reply");
                return Ok(reply);
            }

            self.state = ChatState::ToolCallPending;
            debug!(
                iteration = iteration,
                tool_count = response.tool_calls.len(),
                "Processing tool calls"
            );
            self.add_assistant_response(&response);
            self.execute_tool_calls(&response.tool_calls).await;
        }

        Err(ChatError::MaxTurnsExceeded(self.settings.max_turns))
    }

    fn create_completion_request(&self) -> CompletionRequest {
        CompletionRequest {
            messages: self.conversation.to_messages(&self.system_prompt),
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: self
                .registry
                .specs()
                .into_iter()
                .map(ToolDefinition::from)
                .collect(),
        }
    }

    fn add_assistant_response(&mut self, response: &CompletionResponse) {
        let content = response.content.clone().filter(|c| !c.is_empty());
        self.conversation
            .push_tool_calls(content, response.tool_calls.clone());
    }

    /// Dispatch each call in order; failures become error results
    async fn execute_tool_calls(&mut self, tool_calls: &[ToolCallRequest]) {
        for call in tool_calls {
            self.observer.on_tool_call(call);
            let result = self.registry.dispatch(call).await;
            self.observer.on_tool_result(call, &result);
            self.conversation.push_tool_result(call, result);
        }
    }

    fn should_continue_tool_loop(response: &CompletionResponse) -> bool {
        !response.tool_calls.is_empty()
    }

    fn extract_final_content(response: &CompletionResponse) -> String {
        response.content.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Turn;
    use crate::testing::ScriptedLlmProvider;
    use crate::tools::{ParamSpec, ParamType, ToolErrorKind, ToolSpec};
    use serde_json::json;
    use std::sync::Mutex;

    fn settings(max_turns: usize) -> SessionSettings {
        SessionSettings {
            model: "mock-model".to_string(),
            temperature: None,
            max_tokens: None,
            max_turns,
        }
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                ToolSpec::new("echo", "Echo text").param(ParamSpec::required(
                    "text",
                    ParamType::String,
                    "Text",
                )),
                Ok,
            )
            .unwrap();
        registry
    }

    fn session(provider: Arc<ScriptedLlmProvider>, max_turns: usize) -> ChatSession {
        ChatSession::new(provider, echo_registry(), settings(max_turns))
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl TurnObserver for Recorder {
        fn on_tool_call(&mut self, call: &ToolCallRequest) {
            self.0.lock().unwrap().push(format!("call:{}", call.name));
        }

        fn on_tool_result(&mut self, call: &ToolCallRequest, result: &ToolResult) {
            self.0
                .lock()
                .unwrap()
                .push(format!("result:{}:{}", call.name, result.status()));
        }
    }

    #[tokio::test]
    async fn test_direct_reply() {
        let provider = Arc::new(ScriptedLlmProvider::new(vec![ScriptedLlmProvider::reply(
            "Hello!",
        )]));
        let mut chat = session(provider.clone(), 10);

        let reply = chat.handle_user_turn("hi").await.unwrap();

        assert_eq!(reply, "Hello!");
        assert_eq!(chat.state(), ChatState::AwaitingUserInput);
        assert_eq!(chat.conversation().len(), 2);

        let request = &provider.requests()[0];
        assert_eq!(request.model, "mock-model");
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_call_then_reply() {
        let provider = Arc::new(ScriptedLlmProvider::new(vec![
            ScriptedLlmProvider::call_tools(vec![("echo", json!({"text": "ping"}))]),
            ScriptedLlmProvider::reply("pong"),
        ]));
        let recorder = Recorder::default();
        let mut chat = session(provider.clone(), 10).with_observer(recorder.clone());

        let reply = chat.handle_user_turn("echo ping").await.unwrap();
        assert_eq!(reply, "pong");

        let turns = chat.conversation().turns();
        assert!(matches!(turns[1], Turn::ToolCalls { .. }));
        match &turns[2] {
            Turn::ToolResult { tool, result, .. } => {
                assert_eq!(tool, "echo");
                assert_eq!(result.payload().unwrap()["text"], "ping");
            }
            other => panic!("expected tool result, got {other:?}"),
        }

        // second request carries the tool output back to the model
        let second = &provider.requests()[1];
        let last = second.messages.last().unwrap();
        assert!(last.content.as_deref().unwrap().contains("ping"));

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["call:echo".to_string(), "result:echo:ok".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_keeps_session_alive() {
        let provider = Arc::new(ScriptedLlmProvider::new(vec![
            ScriptedLlmProvider::call_tools(vec![("fly_me_to_mars", json!({}))]),
            ScriptedLlmProvider::reply("I can't do that."),
        ]));
        let mut chat = session(provider, 10);

        let reply = chat.handle_user_turn("take me to mars").await.unwrap();
        assert_eq!(reply, "I can't do that.");

        let error = chat.conversation().turns().iter().find_map(|t| match t {
            Turn::ToolResult { result, .. } => result.error_kind(),
            _ => None,
        });
        assert_eq!(error, Some(ToolErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let provider = Arc::new(ScriptedLlmProvider::new(vec![
            ScriptedLlmProvider::call_tools(vec![("echo", json!({"text": "1"}))]),
            ScriptedLlmProvider::call_tools(vec![("echo", json!({"text": "2"}))]),
            ScriptedLlmProvider::reply("too late"),
        ]));
        let mut chat = session(provider.clone(), 2);

        let result = chat.handle_user_turn("loop").await;

        assert_eq!(result, Err(ChatError::MaxTurnsExceeded(2)));
        assert_eq!(chat.state(), ChatState::AwaitingUserInput);
        assert_eq!(provider.remaining(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let provider = Arc::new(ScriptedLlmProvider::with_failure());
        let mut chat = session(provider, 10);

        let result = chat.handle_user_turn("hello").await;

        assert!(matches!(result, Err(ChatError::Llm(_))));
        assert_eq!(chat.state(), ChatState::AwaitingUserInput);
    }

    #[tokio::test]
    async fn test_missing_content_yields_empty_reply() {
        let mut response = ScriptedLlmProvider::reply("");
        response.content = None;
        let provider = Arc::new(ScriptedLlmProvider::new(vec![response]));
        let mut chat = session(provider, 10);

        assert_eq!(chat.handle_user_turn("?").await.unwrap(), "");
    }

    #[test]
    fn test_settings_from_llm_section() {
        let section = LlmSection::default();
        let settings = SessionSettings::from(&section);
        assert_eq!(settings.max_turns, 10);
        assert_eq!(settings.model, section.model);
    }

    #[test]
    fn test_system_prompt_lists_registered_tools() {
        let provider = Arc::new(ScriptedLlmProvider::new(vec![]));
        let chat = session(provider, 10);
        assert!(chat.system_prompt().contains("1. echo: Echo text"));

        let chat = chat.with_system_prompt("custom");
        assert_eq!(chat.system_prompt(), "custom");
    }
}
