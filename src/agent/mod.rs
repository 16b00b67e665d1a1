pub mod dispatch;
mod loop_impl;
pub mod prompt;

pub use loop_impl::{AgentConfig, ChatAnswer, ChatError, ChatEvent, run_chat, run_chat_with_events};
