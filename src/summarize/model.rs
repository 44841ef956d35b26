//! Language-model transports.

use crate::error::{Result, YtsumError};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object response when it supports it.
    pub json: bool,
}

/// Trait for language-model backends.
///
/// Implementations classify failures: rate limits as `RateLimited`, server
/// errors and timeouts as `TransientNetwork`, credentials as `Auth`, any
/// other rejection as `MalformedRequest`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider and model, for logs.
    fn name(&self) -> String;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// OpenAI chat completions.
pub struct OpenAiModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAiModel {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::openai::create_client_with_timeout(timeout)?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> String {
        format!("openai/{}", self.model)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(classify_openai_error)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(classify_openai_error)?
                .into(),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(request.max_tokens)
            .temperature(0.2);
        if request.json {
            args.response_format(ResponseFormat::JsonObject);
        }
        let chat_request = args.build().map_err(classify_openai_error)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(classify_openai_error)?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| YtsumError::ModelOutput("empty completion".into()))
    }
}

/// Map an async-openai error onto the failure taxonomy.
fn classify_openai_error(e: OpenAIError) -> YtsumError {
    match e {
        OpenAIError::Reqwest(err) => {
            if err.is_timeout() || err.is_connect() {
                YtsumError::TransientNetwork(err.to_string())
            } else {
                YtsumError::Http(err)
            }
        }
        OpenAIError::ApiError(api) => {
            let detail = format!("{:?}", api).to_lowercase();
            let message = api.message.clone();
            if api.r#type.is_none() && api.code.is_none() {
                // Untyped errors come from gateways and proxies, not the API itself.
                YtsumError::TransientNetwork(message)
            } else if detail.contains("rate_limit") {
                YtsumError::RateLimited(message)
            } else if detail.contains("invalid_api_key")
                || detail.contains("authentication")
                || detail.contains("insufficient_quota")
            {
                YtsumError::Auth(message)
            } else if detail.contains("server_error") || detail.contains("overloaded") {
                YtsumError::TransientNetwork(message)
            } else {
                YtsumError::MalformedRequest(message)
            }
        }
        OpenAIError::JSONDeserialize(err) => {
            YtsumError::TransientNetwork(format!("undecodable response: {}", err))
        }
        other => YtsumError::MalformedRequest(other.to_string()),
    }
}

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API over reqwest.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl AnthropicModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: ANTHROPIC_URL.to_string(),
        })
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env(model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| YtsumError::Auth("ANTHROPIC_API_KEY is not set".into()))?;
        Self::new(api_key, model, timeout)
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    fn name(&self) -> String {
        format!("anthropic/{}", self.model)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| YtsumError::Auth("invalid Anthropic API key".into()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    YtsumError::TransientNetwork(e.to_string())
                } else {
                    YtsumError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            // 529 is Anthropic's "overloaded".
            return Err(YtsumError::from_status(status, &text));
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| {
            YtsumError::TransientNetwork(format!("undecodable Anthropic response: {}", e))
        })?;

        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        debug!("Anthropic returned {} chars", answer.len());
        if answer.trim().is_empty() {
            return Err(YtsumError::ModelOutput(
                "Anthropic response missing text content".into(),
            ));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(kind: &str, code: &str) -> OpenAIError {
        let api: ApiError = serde_json::from_value(serde_json::json!({
            "message": format!("{} happened", kind),
            "type": kind,
            "param": null,
            "code": code,
        }))
        .unwrap();
        OpenAIError::ApiError(api)
    }

    #[test]
    fn test_untyped_api_error_is_transient() {
        let api: ApiError = serde_json::from_value(serde_json::json!({
            "message": "upstream connect error",
            "type": null,
            "param": null,
            "code": null,
        }))
        .unwrap();
        let err = classify_openai_error(OpenAIError::ApiError(api));
        assert!(matches!(err, YtsumError::TransientNetwork(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_openai_error_classification() {
        assert!(matches!(
            classify_openai_error(api_error("requests", "rate_limit_exceeded")),
            YtsumError::RateLimited(_)
        ));
        assert!(matches!(
            classify_openai_error(api_error("invalid_request_error", "invalid_api_key")),
            YtsumError::Auth(_)
        ));
        assert!(matches!(
            classify_openai_error(api_error("server_error", "")),
            YtsumError::TransientNetwork(_)
        ));
        assert!(matches!(
            classify_openai_error(api_error("invalid_request_error", "context_length_exceeded")),
            YtsumError::MalformedRequest(_)
        ));
        assert!(matches!(
            classify_openai_error(OpenAIError::InvalidArgument("bad".into())),
            YtsumError::MalformedRequest(_)
        ));
    }

    #[test]
    fn test_anthropic_request_shape() {
        let body = AnthropicRequest {
            model: "claude-3-5-haiku-latest",
            max_tokens: 500,
            system: "sys",
            messages: vec![AnthropicMessage {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "sys");
        assert_eq!(json["max_tokens"], 500);
    }

    #[test]
    fn test_anthropic_response_blocks() {
        let raw = r#"{"content": [{"type": "text", "text": "{\"a\":1}"}, {"type": "thinking", "thinking": "..."}]}"#;
        let parsed: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 2);
        assert!(matches!(parsed.content[1], AnthropicResponseBlock::Other));
    }
}
