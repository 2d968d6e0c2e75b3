//! Generic OpenAI-compatible chat-completion client.
//!
//! Works against any provider exposing OpenAI's `/chat/completions` format
//! (OpenAI, DeepSeek, Together, vLLM, Ollama's compat endpoint, ...).

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use delver_core::{ChatModel, ChatRequest, ChatResponse, DelverError, Message};

#[derive(Serialize, Debug, Clone)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Serialize, Debug, Clone)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize, Debug, Clone)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug, Clone)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug, Clone)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-style error envelope.
#[derive(Deserialize, Debug, Clone)]
struct OpenAiError {
    error: ErrorDetail,
}

#[derive(Deserialize, Debug, Clone)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    default_model: String,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("api_key", &api_key)
            .finish()
    }
}

impl OpenAiCompatibleClient {
    pub fn builder() -> OpenAiCompatibleBuilder {
        OpenAiCompatibleBuilder::default()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Default, Clone)]
pub struct OpenAiCompatibleBuilder {
    base_url: Option<String>,
    api_key: Option<SecretString>,
    default_model: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAiCompatibleBuilder {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(value.into()));
        self
    }

    pub fn default_model(mut self, value: impl Into<String>) -> Self {
        self.default_model = Some(value.into());
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleClient, DelverError> {
        let base_url = self
            .base_url
            .ok_or_else(|| DelverError::InvalidConfig("base_url is required".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .build()
            .map_err(|err| DelverError::LlmProvider(err.to_string()))?;
        Ok(OpenAiCompatibleClient {
            http,
            base_url,
            api_key: self.api_key,
            default_model: self.default_model.unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn invoke(&self, request: ChatRequest) -> Result<ChatResponse, DelverError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };
        let body = ChatCompletionRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
            stream: false,
        };

        let mut http_request = self.http.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response = http_request
            .send()
            .await
            .map_err(|err| DelverError::LlmProvider(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| DelverError::LlmProvider(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAiError>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| text.clone());
            return Err(DelverError::LlmProvider(format!(
                "status {status}: {message}"
            )));
        }

        let decoded: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|err| DelverError::ParseFailed {
                output: text,
                reason: err.to_string(),
            })?;
        let content = decoded
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(DelverError::EmptyResponse);
        }
        Ok(ChatResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_core::{Message, Role};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn invokes_chat_completions_and_extracts_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer secret")
                    .json_body_partial(r#"{"model": "instruct-1"}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "hello"}}]
                }));
            })
            .await;

        let client = OpenAiCompatibleClient::builder()
            .base_url(format!("{}/v1", server.base_url()))
            .api_key("secret")
            .default_model("instruct-1")
            .build()
            .unwrap();

        let response = client
            .invoke(ChatRequest::new("", vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.content, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn json_mode_sets_response_format() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"response_format": {"type": "json_object"}}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "{}"}}]
                }));
            })
            .await;

        let client = OpenAiCompatibleClient::builder()
            .base_url(server.base_url())
            .default_model("m")
            .build()
            .unwrap();
        client
            .invoke(ChatRequest::new("m", vec![Message::user("q")]).json())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_content_maps_to_empty_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  "}}]
                }));
            })
            .await;

        let client = OpenAiCompatibleClient::builder()
            .base_url(server.base_url())
            .default_model("m")
            .build()
            .unwrap();
        let err = client
            .invoke(ChatRequest::new("m", vec![Message::user("q")]))
            .await
            .unwrap_err();
        assert!(matches!(err, DelverError::EmptyResponse));
    }

    #[tokio::test]
    async fn provider_error_envelope_is_decoded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).json_body(json!({
                    "error": {"message": "rate limited"}
                }));
            })
            .await;

        let client = OpenAiCompatibleClient::builder()
            .base_url(server.base_url())
            .default_model("m")
            .build()
            .unwrap();
        let err = client
            .invoke(ChatRequest::new("m", vec![Message::user("q")]))
            .await
            .unwrap_err();
        match err {
            DelverError::LlmProvider(message) => assert!(message.contains("rate limited")),
            other => panic!("expected LlmProvider, got {other:?}"),
        }
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let message = Message {
            role: Role::System,
            content: "s".into(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "system");
    }
}
