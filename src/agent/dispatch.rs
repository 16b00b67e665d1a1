use serde_json::{Map, Value, json};

use crate::llm::provider::{ToolCallRequest, ToolSpec};
use crate::notify::NotificationSink;

pub const DEFAULT_CONTACT_NAME: &str = "Name not provided";
pub const DEFAULT_CONTACT_NOTES: &str = "not provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    RecordUserDetails,
    RecordUnknownQuestion,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::RecordUserDetails, ToolKind::RecordUnknownQuestion];

    pub fn name(self) -> &'static str {
        match self {
            Self::RecordUserDetails => "record_user_details",
            Self::RecordUnknownQuestion => "record_unknown_question",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn spec(self) -> ToolSpec {
        match self {
            Self::RecordUserDetails => ToolSpec {
                name: self.name().to_string(),
                description: "Use this tool to record that a user is interested in being in touch and provided an email address".to_string(),
                parameter_schema: json!({
                    "type": "object",
                    "properties": {
                        "email": {
                            "type": "string",
                            "description": "The email address of this user"
                        },
                        "name": {
                            "type": "string",
                            "description": "The user's name, if they provided it"
                        },
                        "notes": {
                            "type": "string",
                            "description": "Any additional information about the conversation that's worth recording to give context"
                        }
                    },
                    "required": ["email"],
                    "additionalProperties": false
                }),
            },
            Self::RecordUnknownQuestion => ToolSpec {
                name: self.name().to_string(),
                description: "Always use this tool to record any question that couldn't be answered as you didn't know the answer".to_string(),
                parameter_schema: json!({
                    "type": "object",
                    "properties": {
                        "question": {
                            "type": "string",
                            "description": "The question that couldn't be answered"
                        }
                    },
                    "required": ["question"],
                    "additionalProperties": false
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub payload: Value,
}

/// The fixed set of tools the assistant may call, built once at startup and
/// shared read-only across requests.
#[derive(Debug)]
pub struct ToolRegistry<N> {
    sink: N,
    specs: Vec<ToolSpec>,
}

impl<N: NotificationSink + Sync> ToolRegistry<N> {
    pub fn new(sink: N) -> Self {
        Self {
            sink,
            specs: ToolKind::ALL.into_iter().map(ToolKind::spec).collect(),
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name)
    }

    /// Runs one call. Never fails: unknown tools yield `{}` and bad arguments
    /// yield an error payload the model can read.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolResult {
        let payload = match self.lookup(&call.tool_name) {
            Some(kind) => self.dispatch_kind(kind, &call.arguments).await,
            None => {
                tracing::warn!(tool = %call.tool_name, "model requested an unknown tool");
                json!({})
            }
        };

        ToolResult {
            call_id: call.call_id.clone(),
            payload,
        }
    }

    async fn dispatch_kind(&self, kind: ToolKind, args: &Value) -> Value {
        let Some(args) = args.as_object() else {
            return invalid_args(kind, "arguments must be a JSON object");
        };

        match kind {
            ToolKind::RecordUserDetails => {
                let email = match required_str(args, "email") {
                    Ok(email) => email,
                    Err(message) => return invalid_args(kind, &message),
                };
                let name = match optional_str(args, "name") {
                    Ok(name) => name.unwrap_or(DEFAULT_CONTACT_NAME),
                    Err(message) => return invalid_args(kind, &message),
                };
                let notes = match optional_str(args, "notes") {
                    Ok(notes) => notes.unwrap_or(DEFAULT_CONTACT_NOTES),
                    Err(message) => return invalid_args(kind, &message),
                };
                self.notify(&format!(
                    "Recording {name} with email {email} and notes {notes}"
                ))
                .await;
                recorded()
            }
            ToolKind::RecordUnknownQuestion => {
                let question = match required_str(args, "question") {
                    Ok(question) => question,
                    Err(message) => return invalid_args(kind, &message),
                };
                self.notify(&format!("Recording {question}")).await;
                recorded()
            }
        }
    }

    // Delivery failures are logged and otherwise ignored: the model only needs
    // to know the recording was accepted.
    async fn notify(&self, text: &str) {
        if let Err(err) = self.sink.send(text).await {
            tracing::warn!(error = %err, "notification not delivered");
        }
    }
}

fn recorded() -> Value {
    json!({"recorded": "ok"})
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    optional_str(args, key)?.ok_or_else(|| format!("missing required parameter '{key}'"))
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(format!("parameter '{key}' must be a string")),
    }
}

fn invalid_args(kind: ToolKind, message: &str) -> Value {
    json!({
        "error": {
            "code": "invalid_args",
            "message": format!("{}: {message}", kind.name()),
        }
    })
}
