//! Conversation history for one chat session

use crate::llm::Message;
use crate::tools::{ToolCallRequest, ToolResult};
use uuid::Uuid;

/// One entry in the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Assistant(String),
    /// Assistant message that requested tools
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        call_id: String,
        tool: String,
        result: ToolResult,
    },
}

/// Append-only turn log, discarded when the session ends
#[derive(Debug, Clone)]
pub struct ConversationState {
    id: Uuid,
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User(text.into()));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Assistant(text.into()));
    }

    pub fn push_tool_calls(&mut self, content: Option<String>, calls: Vec<ToolCallRequest>) {
        self.turns.push(Turn::ToolCalls { content, calls });
    }

    pub fn push_tool_result(&mut self, request: &ToolCallRequest, result: ToolResult) {
        self.turns.push(Turn::ToolResult {
            call_id: request.id.clone(),
            tool: request.name.clone(),
            result,
        });
    }

    /// Provider messages, led by the system prompt
    pub fn to_messages(&self, system_prompt: &str) -> Vec<Message> {
        std::iter::once(Message::system(system_prompt))
            .chain(self.turns.iter().map(|turn| match turn {
                Turn::User(text) => Message::user(text.clone()),
                Turn::Assistant(text) => Message::assistant(text.clone()),
                Turn::ToolCalls { content, calls } => {
                    Message::assistant_tool_calls(content.clone(), calls.clone())
                }
                Turn::ToolResult {
                    call_id, result, ..
                } => Message::tool(call_id.clone(), result.to_json().to_string()),
            }))
            .collect()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
