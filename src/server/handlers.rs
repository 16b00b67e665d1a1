use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde_json::{Value, json};

use super::ServerContext;
use super::error::ApiError;
use crate::agent::prompt::build_system_prompt;
use crate::agent::{ChatEvent, run_chat_with_events};
use crate::contact::email::Mailer;
use crate::contact::recaptcha::{BotVerifier, Verification};
use crate::contact::{ContactSubmission, compose_contact_email};
use crate::llm::openai::decode_arguments;
use crate::llm::provider::{LlmProvider, Role, ToolCallRequest, Turn};
use crate::notify::NotificationSink;

const HISTORY_NOT_A_LIST: &str = "history must be a list of messages";
const HISTORY_ENTRY_INVALID: &str = "history entries must have a role and string content";
const MESSAGE_REQUIRED: &str = "message is required and must be a string";
const RECAPTCHA_FAILED: &str = "reCAPTCHA verification failed";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Turn>,
}

/// Validates a `/chat` body. `history` is checked before `message`, so a
/// body with both problems reports the history error.
pub fn parse_chat_request(body: &Value) -> Result<ChatRequest, ApiError> {
    let history = match body.get("history") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => parse_history(entries)?,
        Some(_) => return Err(ApiError::bad_request(HISTORY_NOT_A_LIST)),
    };

    let message = match body.get("message") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        _ => return Err(ApiError::bad_request(MESSAGE_REQUIRED)),
    };

    Ok(ChatRequest { message, history })
}

/// Every `tool` entry must answer a call id issued by an earlier assistant
/// entry.
fn parse_history(entries: &[Value]) -> Result<Vec<Turn>, ApiError> {
    let mut issued_call_ids = HashSet::new();
    let mut turns = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        let turn = parse_history_entry(idx, entry)?;
        match turn.role {
            Role::Assistant => {
                issued_call_ids.extend(turn.tool_calls.iter().map(|call| call.call_id.clone()));
            }
            Role::Tool => {
                let answered = turn
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| issued_call_ids.contains(id));
                if !answered {
                    return Err(invalid_entry(
                        idx,
                        "tool_call_id must match a tool call of an earlier assistant entry",
                    ));
                }
            }
            Role::System | Role::User => {}
        }
        turns.push(turn);
    }

    Ok(turns)
}

fn invalid_entry(idx: usize, reason: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request_with(HISTORY_ENTRY_INVALID, format!("history[{idx}]: {reason}"))
}

fn parse_history_entry(idx: usize, entry: &Value) -> Result<Turn, ApiError> {
    let Some(object) = entry.as_object() else {
        return Err(invalid_entry(idx, "not an object"));
    };
    let role = match object.get("role") {
        Some(raw) => serde_json::from_value::<Role>(raw.clone())
            .map_err(|_| invalid_entry(idx, format!("unknown role {raw}")))?,
        None => return Err(invalid_entry(idx, "missing role")),
    };

    let tool_calls = match (role, object.get("tool_calls")) {
        (Role::Assistant, Some(Value::Array(calls))) => calls
            .iter()
            .map(|call| parse_history_tool_call(call).map_err(|reason| invalid_entry(idx, reason)))
            .collect::<Result<Vec<_>, _>>()?,
        (Role::Assistant, None | Some(Value::Null)) => Vec::new(),
        (Role::Assistant, Some(_)) => return Err(invalid_entry(idx, "tool_calls must be a list")),
        _ => Vec::new(),
    };

    // Assistant entries that only carry tool calls may have null content.
    let content = match object.get("content") {
        Some(Value::String(text)) => text.clone(),
        None | Some(Value::Null) if !tool_calls.is_empty() => String::new(),
        _ => return Err(invalid_entry(idx, "content must be a string")),
    };

    let tool_call_id = if role == Role::Tool {
        object
            .get("tool_call_id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    } else {
        None
    };

    Ok(Turn {
        role,
        content,
        tool_call_id,
        tool_calls,
    })
}

/// Accepts the chat-completions shape `{id, type, function: {name,
/// arguments}}`, with `arguments` either a JSON-encoded string or a value.
fn parse_history_tool_call(call: &Value) -> Result<ToolCallRequest, String> {
    let call_id = call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or("tool call is missing its id")?;
    let function = call
        .get("function")
        .ok_or_else(|| format!("tool call {call_id} is missing its function"))?;
    let tool_name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("tool call {call_id} is missing its name"))?;
    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) => decode_arguments(raw),
        Some(other) => other.clone(),
        None => json!({}),
    };

    Ok(ToolCallRequest {
        call_id: call_id.to_string(),
        tool_name: tool_name.to_string(),
        arguments,
    })
}

/// Non-JSON bodies are treated as an empty object.
fn lenient_json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn chat<P, N, V, M>(
    State(ctx): State<Arc<ServerContext<P, N, V, M>>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError>
where
    P: LlmProvider + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    V: BotVerifier + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let request = parse_chat_request(&lenient_json(&body))?;
    let system_prompt = build_system_prompt(&ctx.corpus, ctx.prompt_directives.as_deref());

    let answer = run_chat_with_events(
        &ctx.provider,
        &ctx.tools,
        system_prompt,
        request.history,
        &request.message,
        &ctx.agent,
        &mut log_chat_event,
    )
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "chat request failed");
        ApiError::Internal(err.to_string())
    })?;

    tracing::debug!(round_trips = answer.round_trips, "chat reply ready");
    Ok(Json(json!({ "reply": answer.text })))
}

fn log_chat_event(event: ChatEvent) {
    match event {
        ChatEvent::RoundTripStarted { round_trip } => {
            tracing::debug!(round_trip, "model round-trip");
        }
        ChatEvent::ModelResponse {
            round_trip,
            tool_calls,
            has_text,
        } => {
            tracing::debug!(round_trip, tool_calls, has_text, "model responded");
        }
        ChatEvent::ToolRequest {
            round_trip,
            call_id,
            name,
            arguments,
        } => {
            tracing::info!(round_trip, %call_id, tool = %name, %arguments, "tool called");
        }
        ChatEvent::ToolResult {
            round_trip,
            call_id,
            payload,
        } => {
            tracing::debug!(round_trip, %call_id, %payload, "tool result");
        }
    }
}

pub(super) async fn contact<P, N, V, M>(
    State(ctx): State<Arc<ServerContext<P, N, V, M>>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError>
where
    P: LlmProvider + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    V: BotVerifier + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let payload = lenient_json(&body);
    let token = payload.get("recaptchaToken").and_then(Value::as_str);

    if let Verification::Rejected(reason) = ctx.verifier.verify(token).await {
        tracing::warn!(%reason, "contact form rejected");
        return Err(ApiError::bad_request_with(RECAPTCHA_FAILED, reason));
    }

    let submission = ContactSubmission::from_payload(&payload);
    let email = compose_contact_email(&submission, &ctx.mail_from, &ctx.contact_recipient);
    ctx.mailer.send(email).await.map_err(|err| {
        tracing::error!(error = %err, "contact email failed");
        ApiError::Internal(err.to_string())
    })?;

    Ok(Json(json!({
        "status": "ok",
        "message": "Email sent successfully"
    })))
}
