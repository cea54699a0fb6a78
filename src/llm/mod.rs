//! LLM provider abstraction layer
//!
//! The chat loop depends on the [`LlmProvider`] trait; the OpenAI-compatible
//! implementation lives in [`providers`].

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
