//! Chat model abstraction and the backends the demos talk to.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::{EngineError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolDescription;

/// One reply from the chat backend: either a final answer or a batch of tool requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModelResponse {
    PlainAnswer(String),
    ToolRequest(Vec<ToolCall>),
}

impl ModelResponse {
    fn from_parts(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            ModelResponse::PlainAnswer(content.unwrap_or_default())
        } else {
            ModelResponse::ToolRequest(tool_calls)
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            ModelResponse::PlainAnswer(text) => Message::assistant(text),
            ModelResponse::ToolRequest(calls) => Message::tool_request(calls),
        }
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelResponse>;
}

/// Build the backend named by `cfg.provider`.
pub fn model_from_config(cfg: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match cfg.provider.to_ascii_lowercase().as_str() {
        "ollama" => Ok(Arc::new(OllamaClient::from_config(cfg)?)),
        "openai" => Ok(Arc::new(OpenAIClient::from_config(cfg)?)),
        other => Err(EngineError::Config(format!(
            "unknown model provider `{other}` (expected `ollama` or `openai`)"
        ))),
    }
}

/// Ask for JSON matching `schema` and deserialize the first JSON object in the reply.
pub async fn complete_structured<T: DeserializeOwned>(
    model: &(impl LanguageModel + ?Sized),
    messages: &[Message],
    schema: &Value,
) -> Result<T> {
    let mut request = messages.to_vec();
    request.push(Message::user(format!(
        "Respond only with a JSON object that matches this schema: {schema}"
    )));

    let raw = match model.complete_chat(&request, &[]).await? {
        ModelResponse::PlainAnswer(text) => text,
        ModelResponse::ToolRequest(calls) => {
            return Err(EngineError::Protocol(format!(
                "expected structured JSON, model requested {} tool call(s)",
                calls.len()
            )))
        }
    };

    let start = raw.find('{');
    let end = raw.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(EngineError::Protocol(format!(
                "expected a JSON object in model output, got `{raw}`"
            )))
        }
    };
    serde_json::from_str(body).map_err(|err| {
        EngineError::Protocol(format!("structured output did not match schema: {err}"))
    })
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> EngineError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return EngineError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    EngineError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| EngineError::LanguageModel(format!("http client error: {err}")))
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn function_tools(tools: &[ToolDescription]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t
                        .parameters
                        .clone()
                        .unwrap_or_else(|| json!({"type": "object", "properties": {}}))
                }
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama Client (Local LLM)
// ─────────────────────────────────────────────────────────────────────────────

/// Ollama client for local LLM inference.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub const DEFAULT_HOST: &'static str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &'static str = "llama3.1:8b";

    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        // local models can be slow
        Self::with_timeout(base_url, model, Duration::from_secs(300))
    }

    fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            model: model.into(),
            base_url: base_url.into(),
            temperature: None,
        })
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let client = Self::with_timeout(
            base_url,
            cfg.model.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )?;
        Ok(client.with_temperature(cfg.temperature))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_ollama_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let mut msg = json!({
                    "role": role_name(m.role),
                    "content": m.content,
                });
                if m.has_tool_calls() {
                    msg["tool_calls"] = m
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "function": {"name": call.name, "arguments": call.arguments}
                            })
                        })
                        .collect();
                }
                if let Some(result) = &m.tool_result {
                    msg["tool_name"] = json!(result.name);
                }
                msg
            })
            .collect()
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelResponse> {
        let mut body = json!({
            "model": self.model,
            "messages": Self::to_ollama_messages(messages),
            "stream": false
        });
        if let Some(temperature) = self.temperature {
            body["options"] = json!({ "temperature": temperature });
        }
        if !tools.is_empty() {
            body["tools"] = json!(function_tools(tools));
        }

        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::LanguageModel(format!("Ollama request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "Ollama"));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::LanguageModel(format!("Ollama parse error: {e}")))?;

        let message = &json["message"];
        let content = message["content"].as_str().map(String::from);

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let func = &call["function"];
                let name = func["name"].as_str().unwrap_or_default().to_string();
                let args = match &func["arguments"] {
                    Value::String(raw) => {
                        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                    }
                    other => other.clone(),
                };
                let call = match call["id"].as_str() {
                    Some(id) => ToolCall::new(id, name, args),
                    None => ToolCall::generated(name, args),
                };
                tool_calls.push(call);
            }
        }

        Ok(ModelResponse::from_parts(content, tool_calls))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAIClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(60))?,
            model: model.into(),
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            temperature: None,
        })
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| EngineError::MissingConfig("OPENAI_API_KEY".into()))?;
        Ok(Self {
            http: http_client(Duration::from_secs(cfg.timeout_secs))?,
            model: cfg.model.clone(),
            api_key,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            temperature: Some(cfg.temperature),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn to_openai_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|message| {
                let tool_calls = message.has_tool_calls().then(|| {
                    message
                        .tool_calls
                        .iter()
                        .map(|call| OpenAiToolCall {
                            id: call.id.clone(),
                            r#type: "function".to_string(),
                            function: OpenAiFunctionCall {
                                name: call.name.clone(),
                                arguments: serde_json::to_string(&call.arguments)
                                    .unwrap_or_else(|_| call.arguments.to_string()),
                            },
                        })
                        .collect()
                });
                let content = if message.has_tool_calls() && message.content.is_empty() {
                    None
                } else {
                    Some(message.content.clone())
                };
                OpenAiMessage {
                    role: role_name(message.role).to_string(),
                    content,
                    tool_call_id: message
                        .tool_result
                        .as_ref()
                        .map(|result| result.tool_call_id.clone()),
                    tool_calls,
                }
            })
            .collect()
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelResponse> {
        let mut payload = json!({
            "model": self.model,
            "messages": Self::to_openai_messages(messages),
        });
        if let Some(temperature) = self.temperature {
            payload["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(function_tools(tools));
            payload["tool_choice"] = json!("auto");
        }

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EngineError::LanguageModel(format!("OpenAI request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            EngineError::LanguageModel(format!("OpenAI response parse error: {err}"))
        })?;

        let first = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::LanguageModel("OpenAI returned no choices".into()))?;

        let tool_calls = first
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let args = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                ToolCall::new(call.id, call.function.name, args)
            })
            .collect();

        Ok(ModelResponse::from_parts(first.message.content, tool_calls))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted model
// ─────────────────────────────────────────────────────────────────────────────

/// What a [`StubModel`] was asked.
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// A deterministic model used for tests and offline demos.
///
/// Each scripted response is either a JSON directive or plain text:
/// - `{"action":"respond","content":"..."}`
/// - `{"action":"call_tool","name":"...","arguments":{...}}`
/// - `{"action":"call_tools","calls":[{"name":"...","arguments":{...}}, ...]}`
///
/// Anything that does not parse as a directive is returned as a plain answer.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<StubRequest>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StubDirective {
    Respond { content: String },
    CallTool {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    CallTools { calls: Vec<StubCall> },
}

#[derive(Debug, Deserialize)]
struct StubCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    fn next_call_id(&self, requested: Option<String>, seq: usize) -> String {
        requested.unwrap_or_else(|| format!("call_{seq}"))
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelResponse> {
        let turn = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| EngineError::LanguageModel("stub model poisoned".into()))?;
            requests.push(StubRequest {
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });
            requests.len()
        };

        let raw = self
            .responses
            .lock()
            .map_err(|_| EngineError::LanguageModel("stub model poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                EngineError::LanguageModel("StubModel ran out of scripted responses".into())
            })?;

        let response = match serde_json::from_str::<StubDirective>(&raw) {
            Ok(StubDirective::Respond { content }) => ModelResponse::PlainAnswer(content),
            Ok(StubDirective::CallTool {
                id,
                name,
                arguments,
            }) => ModelResponse::ToolRequest(vec![ToolCall::new(
                self.next_call_id(id, turn * 100),
                name,
                arguments,
            )]),
            Ok(StubDirective::CallTools { calls }) => ModelResponse::ToolRequest(
                calls
                    .into_iter()
                    .enumerate()
                    .map(|(idx, call)| {
                        ToolCall::new(
                            self.next_call_id(call.id, turn * 100 + idx),
                            call.name,
                            call.arguments,
                        )
                    })
                    .collect(),
            ),
            Err(_) => ModelResponse::PlainAnswer(raw),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        answer: String,
        sources: Vec<String>,
    }

    #[tokio::test]
    async fn stub_parses_directives() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tools","calls":[{"name":"a","arguments":{}},{"id":"x","name":"b"}]}"#
                .into(),
            "plain text".into(),
        ]);

        let first = model.complete_chat(&[], &[]).await.unwrap();
        match first {
            ModelResponse::ToolRequest(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].name, "a");
                assert_eq!(calls[1].id, "x");
                assert_ne!(calls[0].id, calls[1].id);
            }
            other => panic!("expected tool request, got {other:?}"),
        }

        let second = model.complete_chat(&[], &[]).await.unwrap();
        assert_eq!(second, ModelResponse::PlainAnswer("plain text".into()));
        assert!(model.complete_chat(&[], &[]).await.is_err());
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn structured_output_extracts_embedded_json() {
        let model = StubModel::new(vec![
            "Sure! {\"answer\":\"42\",\"sources\":[\"https://example.com\"]} hope that helps".into(),
        ]);

        let parsed: Answer = complete_structured(
            model.as_ref(),
            &[Message::user("q")],
            &json!({"answer": "string", "sources": ["string"]}),
        )
        .await
        .unwrap();

        assert_eq!(parsed.answer, "42");
        assert_eq!(parsed.sources, vec!["https://example.com".to_string()]);
        let sent = &model.requests()[0].messages;
        assert!(sent.last().unwrap().content.contains("JSON object"));
    }

    #[tokio::test]
    async fn structured_output_rejects_prose() {
        let model = StubModel::new(vec!["no json here".into()]);
        let err = complete_structured::<Answer>(model.as_ref(), &[], &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
    }

    #[tokio::test]
    async fn ollama_maps_tool_calls_and_generates_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "add", "arguments": {"a": 12, "b": 7}}}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "llama3.1:8b").unwrap();
        let response = client
            .complete_chat(&[Message::user("what is 12 + 7")], &[])
            .await
            .unwrap();

        match response {
            ModelResponse::ToolRequest(calls) => {
                assert_eq!(calls[0].name, "add");
                assert_eq!(calls[0].arguments, json!({"a": 12, "b": 7}));
                assert!(calls[0].id.starts_with("call_"));
            }
            other => panic!("expected tool request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ollama_surfaces_http_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "missing").unwrap();
        let err = client.complete_chat(&[], &[]).await.unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn ollama_from_config_applies_timeout_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "slow", "options": {"temperature": 0.5}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": {"role": "assistant", "content": "late"}}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let cfg = ModelConfig {
            model: "slow".into(),
            temperature: 0.5,
            base_url: Some(server.uri()),
            timeout_secs: 1,
            ..ModelConfig::default()
        };
        let client = OllamaClient::from_config(&cfg).unwrap();
        assert_eq!(client.model(), "slow");

        let err = client
            .complete_chat(&[Message::user("hi")], &[])
            .await
            .unwrap_err();
        // transport error, not an HTTP status: the request matched and then timed out
        assert!(
            matches!(err, EngineError::LanguageModel(ref msg) if msg.starts_with("Ollama request failed:"))
        );
    }

    #[tokio::test]
    async fn openai_parses_string_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": {"name": "add", "arguments": "{\"a\":1,\"b\":2}"}
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("sk-test", "gpt-4o-mini")
            .unwrap()
            .with_base_url(server.uri());
        let response = client.complete_chat(&[Message::user("1+2")], &[]).await.unwrap();

        assert_eq!(
            response,
            ModelResponse::ToolRequest(vec![ToolCall::new("call_abc", "add", json!({"a":1,"b":2}))])
        );
    }

    #[test]
    fn openai_requires_a_key() {
        let cfg = ModelConfig {
            provider: "openai".into(),
            api_key: None,
            ..ModelConfig::default()
        };
        let err = OpenAIClient::from_config(&cfg).err().unwrap();
        assert!(matches!(err, EngineError::MissingConfig(_)));
    }
}
