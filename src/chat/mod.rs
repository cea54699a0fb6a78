//! Chat loop between the user, the model and the tool registry

pub mod conversation;
pub mod prompts;
pub mod repl;
pub mod session;

pub use conversation::{ConversationState, Turn};
pub use prompts::{system_prompt, EXAMPLE_PROMPTS};
pub use repl::{format_tool_call, is_exit_command, ConsoleObserver};
pub use session::{
    ChatError, ChatSession, ChatState, NoopObserver, SessionSettings, TurnObserver,
};
