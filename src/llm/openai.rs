use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{
    LlmError, LlmProvider, LlmResult, ModelReply, ModelRequest, Role, ToolCallRequest, ToolSpec,
    Turn,
};
use crate::http::client::HttpClient;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Chat Completions client with function-tool support.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> LlmResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &ModelRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.turns.iter().map(wire_message).collect(),
            tools: request.tools.iter().map(wire_tool).collect(),
        }
    }

    fn extract_reply(resp: ChatCompletionResponse) -> LlmResult<ModelReply> {
        let Some(choice) = resp.choices.into_iter().next() else {
            return Err(LlmError::EmptyResponse);
        };

        let content = choice
            .message
            .content
            .filter(|text| !text.trim().is_empty());
        let tool_calls = choice.message.tool_calls.unwrap_or_default();

        if !tool_calls.is_empty() {
            let calls = tool_calls
                .into_iter()
                .map(|call| ToolCallRequest {
                    call_id: call.id,
                    tool_name: call.function.name,
                    arguments: decode_arguments(&call.function.arguments),
                })
                .collect();
            return Ok(ModelReply::ToolCalls { content, calls });
        }

        content.map(ModelReply::Text).ok_or(LlmError::EmptyResponse)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn generate(&self, request: ModelRequest) -> LlmResult<ModelReply> {
        let payload = self.build_request(&request);
        let resp = self
            .http
            .post_json(&self.endpoint(), Some(&self.api_key), &payload)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !resp.is_success() {
            let body = resp.body.chars().take(400).collect::<String>();
            return Err(LlmError::HttpStatus {
                status: resp.status,
                body,
            });
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&resp.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        Self::extract_reply(parsed)
    }
}

// Arguments arrive as a JSON-encoded string. Anything that fails to parse is
// kept verbatim so it can be echoed back unchanged.
pub(crate) fn decode_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn wire_message(turn: &Turn) -> WireMessage {
    let content = match turn.role {
        Role::Assistant if !turn.tool_calls.is_empty() && turn.content.is_empty() => None,
        _ => Some(turn.content.clone()),
    };

    WireMessage {
        role: turn.role,
        content,
        tool_call_id: turn.tool_call_id.clone(),
        tool_calls: turn
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.call_id.clone(),
                kind: "function".to_string(),
                function: WireFunctionCall {
                    name: call.tool_name.clone(),
                    arguments: encode_arguments(&call.arguments),
                },
            })
            .collect(),
    }
}

fn wire_tool(spec: &ToolSpec) -> WireTool {
    WireTool {
        kind: "function".to_string(),
        function: WireFunction {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameter_schema.clone(),
        },
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    // Some compatible servers send `null` instead of omitting the field.
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::OpenAiProvider;
    use crate::http::client::HttpClient;
    use crate::http::debug::HttpDebugConfig;
    use crate::llm::provider::{
        LlmError, LlmProvider, ModelReply, ModelRequest, ToolCallRequest, ToolSpec, Turn,
    };
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> OpenAiProvider {
        OpenAiProvider::new(
            HttpClient::new(Client::new(), HttpDebugConfig::disabled()),
            Some("test-key".to_string()),
            "test-model".to_string(),
            base_url,
        )
        .expect("provider")
    }

    fn request() -> ModelRequest {
        ModelRequest {
            turns: vec![Turn::system("be Ada"), Turn::user("hello")],
            tools: vec![ToolSpec {
                name: "record_unknown_question".to_string(),
                description: "record it".to_string(),
                parameter_schema: json!({"type": "object", "properties": {}}),
            }],
        }
    }

    #[tokio::test]
    async fn generate_returns_text_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "be Ada"},
                    {"role": "user", "content": "hello"}
                ],
                "tools": [{"type": "function", "function": {"name": "record_unknown_question"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "Hi, I'm Ada."}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(server.uri())
            .generate(request())
            .await
            .expect("success response");

        assert_eq!(reply, ModelReply::Text("Hi, I'm Ada.".to_string()));
    }

    #[tokio::test]
    async fn generate_accepts_null_tool_calls_and_keeps_text_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"content": "  Hi, I'm Ada.\n", "tool_calls": null}
                }]
            })))
            .mount(&server)
            .await;

        let reply = provider(server.uri())
            .generate(request())
            .await
            .expect("success response");

        assert_eq!(reply, ModelReply::Text("  Hi, I'm Ada.\n".to_string()));
    }

    #[tokio::test]
    async fn generate_decodes_tool_calls_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "finish_reason": "tool_calls",
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {"id": "call_1", "type": "function", "function": {
                                "name": "record_user_details",
                                "arguments": "{\"email\":\"a@b.com\"}"
                            }},
                            {"id": "call_2", "type": "function", "function": {
                                "name": "record_unknown_question",
                                "arguments": "not json"
                            }}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let reply = provider(server.uri())
            .generate(request())
            .await
            .expect("success response");

        assert_eq!(
            reply,
            ModelReply::ToolCalls {
                content: None,
                calls: vec![
                    ToolCallRequest {
                        call_id: "call_1".to_string(),
                        tool_name: "record_user_details".to_string(),
                        arguments: json!({"email": "a@b.com"}),
                    },
                    ToolCallRequest {
                        call_id: "call_2".to_string(),
                        tool_name: "record_unknown_question".to_string(),
                        arguments: json!("not json"),
                    },
                ],
            }
        );
    }

    #[tokio::test]
    async fn generate_echoes_tool_turns_back_in_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "user", "content": "my email is a@b.com"},
                    {"role": "assistant", "content": null, "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {
                            "name": "record_user_details",
                            "arguments": "{\"email\":\"a@b.com\"}"
                        }}
                    ]},
                    {"role": "tool", "tool_call_id": "call_1", "content": "{\"recorded\":\"ok\"}"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Thanks!"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(server.uri())
            .generate(ModelRequest {
                turns: vec![
                    Turn::user("my email is a@b.com"),
                    Turn::assistant_tool_calls(
                        None,
                        vec![ToolCallRequest {
                            call_id: "call_1".to_string(),
                            tool_name: "record_user_details".to_string(),
                            arguments: json!({"email": "a@b.com"}),
                        }],
                    ),
                    Turn::tool("call_1", "{\"recorded\":\"ok\"}"),
                ],
                tools: vec![],
            })
            .await
            .expect("success response");

        assert_eq!(reply, ModelReply::Text("Thanks!".to_string()));
    }

    #[tokio::test]
    async fn generate_maps_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = provider(server.uri())
            .generate(request())
            .await
            .expect_err("expected auth error");

        match err {
            LlmError::HttpStatus { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid key"));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_returns_empty_response_error_when_no_text_or_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "   "}}]
            })))
            .mount(&server)
            .await;

        let err = provider(server.uri())
            .generate(request())
            .await
            .expect_err("expected empty response error");

        assert_eq!(err, LlmError::EmptyResponse);
    }

    #[tokio::test]
    async fn generate_maps_undecodable_body_to_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider(server.uri())
            .generate(request())
            .await
            .expect_err("expected parse error");

        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn new_requires_api_key() {
        let err = OpenAiProvider::new(
            HttpClient::new(Client::new(), HttpDebugConfig::disabled()),
            Some("   ".to_string()),
            "test-model".to_string(),
            "https://example.com".to_string(),
        )
        .expect_err("blank key should fail");

        assert_eq!(err, LlmError::MissingApiKey);
    }
}
