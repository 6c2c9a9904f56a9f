//! OpenAI-compatible HTTP completion backend.
//!
//! Cerebras, DeepSeek and OpenAI all expose `POST {base}/chat/completions`
//! with the same request and response shape.

use crate::backend::{
    CompletionBackend, CompletionRequest, CompletionResponse, Provider, ResponseFormat, TokenUsage,
};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

const USER_AGENT: &str = "lucy/0.1";

/// Connection settings for one provider.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// The provider type.
    pub provider: Provider,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
}

impl HttpBackendConfig {
    /// Creates a provider configuration.
    #[must_use]
    pub fn new(provider: Provider, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// A completion backend speaking the OpenAI chat completions protocol.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Creates a backend with its own HTTP client.
    #[must_use]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Creates a backend sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: HttpBackendConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// Builds the JSON body for a chat completion call.
#[must_use]
pub fn request_body(request: &CompletionRequest) -> JsonValue {
    let response_format = match &request.response_format {
        ResponseFormat::JsonObject => json!({ "type": "json_object" }),
        ResponseFormat::JsonSchema { name, schema } => json!({
            "type": "json_schema",
            "json_schema": { "name": name, "schema": schema, "strict": true },
        }),
    };

    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
        "response_format": response_format,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts the first choice's content from a completion body.
///
/// # Errors
///
/// Returns an error if the body is not a completion or has no choices.
pub fn parse_completion(body: &str, requested_model: &str) -> Result<CompletionResponse, LlmError> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseParseFailed {
            reason: "completion has no choices".to_string(),
        })?
        .message
        .content
        .unwrap_or_else(|| "{}".to_string());

    Ok(CompletionResponse {
        content,
        usage: completion.usage.unwrap_or_default(),
        model: completion
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let provider = self.config.provider;
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::ProviderUnavailable {
                provider: provider.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                status: Some(status.as_u16()),
                reason: body,
            });
        }

        let completion = parse_completion(&body, &request.model)?;
        debug!(
            %provider,
            model = %completion.model,
            tokens = completion.usage.total(),
            "completion received"
        );
        Ok(completion)
    }

    fn provider(&self) -> Provider {
        self.config.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;

    #[test]
    fn body_uses_json_object_by_default() {
        let request = CompletionRequest::new("llama-3.3-70b", vec![ChatMessage::user("hi")])
            .with_max_tokens(Some(50));
        let body = request_body(&request);

        assert_eq!(body["model"], "llama-3.3-70b");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 50);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn body_embeds_strict_schema() {
        let request = CompletionRequest::new("gpt-4o-mini", Vec::new())
            .with_json_schema("reply", json!({"type": "object"}));
        let body = request_body(&request);

        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "reply");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{
            "model": "llama-3.3-70b",
            "choices": [{"message": {"content": "{\"message\":\"hey\"}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        }"#;
        let response = parse_completion(body, "fallback-name").expect("parse");

        assert_eq!(response.content, r#"{"message":"hey"}"#);
        assert_eq!(response.usage.total(), 16);
        assert_eq!(response.model, "llama-3.3-70b");
    }

    #[test]
    fn missing_content_becomes_empty_object() {
        let body = r#"{"choices": [{"message": {}}]}"#;
        let response = parse_completion(body, "deepseek-chat").expect("parse");

        assert_eq!(response.content, "{}");
        assert_eq!(response.model, "deepseek-chat");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let err = parse_completion(r#"{"choices": []}"#, "m").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParseFailed { .. }));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let backend = HttpBackend::new(HttpBackendConfig::new(
            Provider::Cerebras,
            "https://api.cerebras.ai/v1/",
            "key",
        ));
        assert_eq!(
            backend.endpoint(),
            "https://api.cerebras.ai/v1/chat/completions"
        );
    }
}
