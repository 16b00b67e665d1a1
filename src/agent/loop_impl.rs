use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::agent::dispatch::ToolRegistry;
use crate::llm::provider::{LlmError, LlmProvider, ModelReply, ModelRequest, Turn};
use crate::notify::NotificationSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_round_trips: usize,
    pub per_call_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: 8,
            per_call_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    pub text: String,
    pub round_trips: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    Provider(LlmError),
    Timeout { round_trip: usize, timeout_ms: u64 },
    DidNotTerminate { round_trips: usize },
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(err) => write!(f, "{err}"),
            Self::Timeout {
                round_trip,
                timeout_ms,
            } => write!(
                f,
                "model provider did not answer round-trip {round_trip} within {timeout_ms} ms"
            ),
            Self::DidNotTerminate { round_trips } => write!(
                f,
                "conversation did not terminate after {round_trips} model round-trips"
            ),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    RoundTripStarted {
        round_trip: usize,
    },
    ModelResponse {
        round_trip: usize,
        tool_calls: usize,
        has_text: bool,
    },
    ToolRequest {
        round_trip: usize,
        call_id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        round_trip: usize,
        call_id: String,
        payload: Value,
    },
}

pub async fn run_chat<P, N>(
    provider: &P,
    tools: &ToolRegistry<N>,
    system_prompt: String,
    history: Vec<Turn>,
    message: &str,
    config: &AgentConfig,
) -> Result<ChatAnswer, ChatError>
where
    P: LlmProvider + Sync,
    N: NotificationSink + Sync,
{
    run_chat_with_events(
        provider,
        tools,
        system_prompt,
        history,
        message,
        config,
        &mut |_| {},
    )
    .await
}

/// Drives one chat request to completion.
///
/// The conversation starts as `[system, ..history, user]` and only ever grows
/// by appending. Each tool call the model makes is answered by exactly one
/// `tool` turn carrying the same call id, in request order.
pub async fn run_chat_with_events<P, N, F>(
    provider: &P,
    tools: &ToolRegistry<N>,
    system_prompt: String,
    history: Vec<Turn>,
    message: &str,
    config: &AgentConfig,
    on_event: &mut F,
) -> Result<ChatAnswer, ChatError>
where
    P: LlmProvider + Sync,
    N: NotificationSink + Sync,
    F: FnMut(ChatEvent) + Send,
{
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(Turn::system(system_prompt));
    turns.extend(history);
    turns.push(Turn::user(message));

    let per_call = Duration::from_millis(config.per_call_timeout_ms);

    for round_trip in 1..=config.max_round_trips {
        on_event(ChatEvent::RoundTripStarted { round_trip });

        let reply = timeout(
            per_call,
            provider.generate(ModelRequest {
                turns: turns.clone(),
                tools: tools.specs().to_vec(),
            }),
        )
        .await
        .map_err(|_| ChatError::Timeout {
            round_trip,
            timeout_ms: config.per_call_timeout_ms,
        })?
        .map_err(ChatError::Provider)?;

        match reply {
            ModelReply::Text(text) => {
                on_event(ChatEvent::ModelResponse {
                    round_trip,
                    tool_calls: 0,
                    has_text: true,
                });
                turns.push(Turn::assistant(text.clone()));
                return Ok(ChatAnswer {
                    text,
                    round_trips: round_trip,
                });
            }
            ModelReply::ToolCalls { content, calls } => {
                on_event(ChatEvent::ModelResponse {
                    round_trip,
                    tool_calls: calls.len(),
                    has_text: content.is_some(),
                });
                turns.push(Turn::assistant_tool_calls(content, calls.clone()));

                for call in &calls {
                    on_event(ChatEvent::ToolRequest {
                        round_trip,
                        call_id: call.call_id.clone(),
                        name: call.tool_name.clone(),
                        arguments: call.arguments.clone(),
                    });
                    let result = tools.dispatch(call).await;
                    on_event(ChatEvent::ToolResult {
                        round_trip,
                        call_id: result.call_id.clone(),
                        payload: result.payload.clone(),
                    });
                    turns.push(Turn::tool(result.call_id, result.payload.to_string()));
                }
            }
        }
    }

    Err(ChatError::DidNotTerminate {
        round_trips: config.max_round_trips,
    })
}
