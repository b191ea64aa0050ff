//! OpenAI-compatible provider adapter.
//!
//! A single [`OpenAiCompatAdapter`] serves OpenAI, Groq (Llama-class),
//! and Google Gemini -- three provider classes from one codebase via
//! configurable base URLs and factory functions.
//!
//! Uses [`async_openai`] for type-safe request/response handling and
//! built-in SSE streaming.

pub mod config;
pub mod streaming;

use std::pin::Pin;
use std::time::Instant;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};
use async_openai::Client;
use futures_util::Stream;

use replyforge_core::llm::adapter::ProviderAdapter;
use replyforge_types::llm::{
    GenerationConstraints, GenerationOutput, ProbeResult, ProviderError, RenderedPrompt, TextChunk,
    Usage,
};

use self::config::OpenAiCompatConfig;
use self::streaming::map_openai_stream;

/// Unified adapter for any OpenAI-compatible API.
///
/// Does NOT derive Debug to prevent accidental exposure of the API key
/// stored inside the `async_openai::Client`. Same defense-in-depth pattern
/// as [`super::anthropic::AnthropicAdapter`].
pub struct OpenAiCompatAdapter {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
}

impl OpenAiCompatAdapter {
    /// Create a new OpenAI-compatible adapter from a configuration.
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            provider_name: config.provider_name,
            model: config.model,
        }
    }

    /// Create an OpenAI adapter (OpenAI-class).
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self::new(config::openai_defaults(api_key, model))
    }

    /// Create a Groq adapter (Llama-class).
    pub fn groq(api_key: &str, model: &str) -> Self {
        Self::new(config::groq_defaults(api_key, model))
    }

    /// Create a Google Gemini adapter (Gemini-class, OpenAI-compatible
    /// beta endpoint).
    pub fn gemini(api_key: &str, model: &str) -> Self {
        Self::new(config::gemini_defaults(api_key, model))
    }

    /// The model this adapter requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build a [`CreateChatCompletionRequest`] from the generic prompt and
    /// constraints.
    fn build_request(
        &self,
        prompt: &RenderedPrompt,
        constraints: &GenerationConstraints,
        stream: bool,
    ) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = prompt.system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(system.clone()),
                    name: None,
                },
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt.user.clone()),
                name: None,
            },
        ));

        let mut request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: Some(constraints.max_tokens),
            temperature: Some(constraints.temperature as f32),
            ..Default::default()
        };

        if stream {
            request.stream = Some(true);
            request.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        request
    }
}

impl ProviderAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        constraints: &GenerationConstraints,
    ) -> Result<GenerationOutput, ProviderError> {
        let request = self.build_request(prompt, constraints, false);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(GenerationOutput {
            text,
            structured_fields: None,
            model: response.model,
            usage,
        })
    }

    fn generate_stream(
        &self,
        prompt: RenderedPrompt,
        constraints: GenerationConstraints,
    ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
        let request = self.build_request(&prompt, &constraints, true);

        // Clone the client for the 'static stream closure.
        let client = self.client.clone();

        Box::pin(async_stream::stream! {
            let oai_stream = match client.chat().create_stream(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    yield Err(map_openai_error(e));
                    return;
                }
            };

            let mut inner = map_openai_stream(oai_stream);

            use futures_util::StreamExt;
            while let Some(chunk) = inner.next().await {
                yield chunk;
            }
        })
    }

    async fn health_probe(&self) -> ProbeResult {
        // A minimal one-token completion; the chat endpoint is the only
        // surface all OpenAI-compatible backends are guaranteed to serve.
        let prompt = RenderedPrompt {
            system: None,
            user: "ping".to_string(),
        };
        let constraints = GenerationConstraints {
            max_tokens: 1,
            temperature: 0.0,
        };
        let request = self.build_request(&prompt, &constraints, false);

        let started = Instant::now();
        let reachable = self.client.chat().create(request).await.is_ok();

        ProbeResult {
            reachable,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Map an `async_openai::error::OpenAIError` to a [`ProviderError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> ProviderError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "authentication_error"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("Invalid API key")
            {
                ProviderError::Auth
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                ProviderError::RateLimited {
                    retry_after_ms: None,
                }
            } else {
                ProviderError::Transport(err.to_string())
            }
        }
        OpenAIError::Reqwest(reqwest_err) => {
            if let Some(status) = reqwest_err.status() {
                match status.as_u16() {
                    401 | 403 => ProviderError::Auth,
                    429 => ProviderError::RateLimited {
                        retry_after_ms: None,
                    },
                    _ => ProviderError::Transport(err.to_string()),
                }
            } else {
                ProviderError::Transport(err.to_string())
            }
        }
        OpenAIError::JSONDeserialize(_, content) => {
            ProviderError::MalformedResponse(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => {
            ProviderError::Transport(format!("stream error: {stream_err}"))
        }
        _ => ProviderError::Transport(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_factory() {
        let adapter = OpenAiCompatAdapter::openai("sk-test", "gpt-4o-mini");
        assert_eq!(ProviderAdapter::name(&adapter), "openai");
        assert_eq!(adapter.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_groq_factory() {
        let adapter = OpenAiCompatAdapter::groq("gsk-test", "llama-3.1-8b-instant");
        assert_eq!(ProviderAdapter::name(&adapter), "groq");
        assert_eq!(adapter.model(), "llama-3.1-8b-instant");
    }

    #[test]
    fn test_gemini_factory() {
        let adapter = OpenAiCompatAdapter::gemini("g-test", "gemini-2.0-flash");
        assert_eq!(ProviderAdapter::name(&adapter), "gemini");
    }

    #[test]
    fn test_build_request_includes_system_and_user() {
        let adapter = OpenAiCompatAdapter::openai("sk-test", "gpt-4o-mini");
        let prompt = RenderedPrompt {
            system: Some("You are helpful.".to_string()),
            user: "Hello".to_string(),
        };
        let constraints = GenerationConstraints {
            max_tokens: 2000,
            temperature: 0.7,
        };

        let request = adapter.build_request(&prompt, &constraints, false);
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.max_completion_tokens, Some(2000));
        assert!(request.stream.is_none());
    }

    #[test]
    fn test_build_request_stream_options() {
        let adapter = OpenAiCompatAdapter::openai("sk-test", "gpt-4o-mini");
        let prompt = RenderedPrompt {
            system: None,
            user: "Hello".to_string(),
        };
        let constraints = GenerationConstraints {
            max_tokens: 100,
            temperature: 0.2,
        };

        let request = adapter.build_request(&prompt, &constraints, true);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.stream, Some(true));
        assert!(request.stream_options.is_some());
    }
}
