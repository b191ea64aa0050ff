//! AnthropicAdapter -- concrete [`ProviderAdapter`] for Anthropic Claude.
//!
//! Sends requests to the Anthropic Messages API (`/v1/messages`) with the
//! required authentication headers. Supports non-streaming (`generate`),
//! streaming (`generate_stream`), and a `/v1/models` reachability probe.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::pin::Pin;
use std::time::{Duration, Instant};

use futures_util::Stream;
use secrecy::{ExposeSecret, SecretString};

use replyforge_core::llm::adapter::ProviderAdapter;
use replyforge_types::llm::{
    GenerationConstraints, GenerationOutput, ProbeResult, ProviderError, RenderedPrompt, TextChunk,
    Usage,
};

use super::streaming::create_anthropic_stream;
use super::types::{AnthropicContentBlock, AnthropicMessage, AnthropicNonStreamResponse, AnthropicRequest};

/// The Anthropic API version header value.
pub(crate) const API_VERSION: &str = "2023-06-01";

/// Claude-class provider adapter.
///
/// Does NOT derive Debug so the API key can never leak through debug
/// formatting.
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl AnthropicAdapter {
    /// Create a new Anthropic adapter.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key wrapped in SecretString
    /// * `model` - Model identifier (e.g., "claude-sonnet-4-20250514")
    pub fn new(api_key: SecretString, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // safety net; the dispatcher applies the real per-call timeout
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model,
        }
    }

    /// The model this adapter requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert the generic prompt + constraints into an [`AnthropicRequest`].
    fn to_anthropic_request(
        &self,
        prompt: &RenderedPrompt,
        constraints: &GenerationConstraints,
        stream: bool,
    ) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: constraints.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
            system: prompt.system.clone(),
            stream,
            temperature: Some(constraints.temperature),
        }
    }
}

/// Map a non-2xx Anthropic response to a [`ProviderError`].
pub(crate) fn map_status(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth,
        429 => ProviderError::RateLimited {
            retry_after_ms: None,
        },
        _ => ProviderError::Transport(format!("HTTP {status}: {body}")),
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        constraints: &GenerationConstraints,
    ) -> Result<GenerationOutput, ProviderError> {
        let body = self.to_anthropic_request(prompt, constraints, false);
        let url = self.url("/v1/messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status, error_body));
        }

        let anthropic_resp: AnthropicNonStreamResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("failed to parse response: {e}"))
        })?;

        let text = anthropic_resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationOutput {
            text,
            structured_fields: None,
            model: anthropic_resp.model,
            usage: Usage {
                input_tokens: anthropic_resp.usage.input_tokens,
                output_tokens: anthropic_resp.usage.output_tokens,
            },
        })
    }

    fn generate_stream(
        &self,
        prompt: RenderedPrompt,
        constraints: GenerationConstraints,
    ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
        let body = self.to_anthropic_request(&prompt, &constraints, true);
        let url = self.url("/v1/messages");

        create_anthropic_stream(&self.client, &url, body, &self.api_key)
    }

    async fn health_probe(&self) -> ProbeResult {
        let started = Instant::now();
        let reachable = self
            .client
            .get(self.url("/v1/models"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);

        ProbeResult {
            reachable,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            SecretString::from("test-key-not-real"),
            "claude-sonnet-4-20250514".to_string(),
        )
    }

    #[test]
    fn test_adapter_name() {
        let adapter = make_adapter();
        assert_eq!(ProviderAdapter::name(&adapter), "anthropic");
    }

    #[test]
    fn test_to_anthropic_request() {
        let adapter = make_adapter();
        let prompt = RenderedPrompt {
            system: Some("You are helpful.".to_string()),
            user: "Hello".to_string(),
        };
        let constraints = GenerationConstraints {
            max_tokens: 2000,
            temperature: 0.7,
        };
        let req = adapter.to_anthropic_request(&prompt, &constraints, false);

        assert_eq!(req.model, "claude-sonnet-4-20250514");
        assert_eq!(req.max_tokens, 2000);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.messages[0].content, "Hello");
        assert_eq!(req.system.as_deref(), Some("You are helpful."));
        assert!(!req.stream);
    }

    #[test]
    fn test_with_base_url() {
        let adapter = make_adapter().with_base_url("http://localhost:8080".to_string());
        assert_eq!(adapter.url("/v1/messages"), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(
            map_status(reqwest::StatusCode::UNAUTHORIZED, String::new()),
            ProviderError::Auth
        ));
        assert!(matches!(
            map_status(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            map_status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                "boom".to_string()
            ),
            ProviderError::Transport(_)
        ));
    }
}
