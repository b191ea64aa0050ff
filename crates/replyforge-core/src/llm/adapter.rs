//! ProviderAdapter trait definition.
//!
//! This is the uniform capability surface over one LLM backend. The
//! dispatcher only ever talks to this contract -- it never branches on
//! provider identity. Uses RPITIT for `generate` and `health_probe`, and
//! `Pin<Box<dyn Stream>>` for `generate_stream` (streams need to be
//! object-safe for the BoxProviderAdapter wrapper).

use std::pin::Pin;

use futures_util::Stream;

use replyforge_types::llm::{
    GenerationConstraints, GenerationOutput, ProbeResult, ProviderError, RenderedPrompt, TextChunk,
};

/// Trait for LLM provider backends (OpenAI-class, Llama-class,
/// Gemini-class, Claude-class).
///
/// Implementations live in replyforge-infra (e.g., `AnthropicAdapter`).
pub trait ProviderAdapter: Send + Sync {
    /// Human-readable provider name (e.g., "openai", "groq").
    fn name(&self) -> &str;

    /// Send a generation request and receive the full output.
    fn generate(
        &self,
        prompt: &RenderedPrompt,
        constraints: &GenerationConstraints,
    ) -> impl std::future::Future<Output = Result<GenerationOutput, ProviderError>> + Send;

    /// Start a streaming generation. Returns a finite, non-restartable
    /// sequence of chunks; the last chunk carries `done = true`.
    ///
    /// Returns a boxed stream (not RPITIT) because streams need to be
    /// object-safe for the `BoxProviderAdapter` wrapper.
    fn generate_stream(
        &self,
        prompt: RenderedPrompt,
        constraints: GenerationConstraints,
    ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>>;

    /// Cheap reachability check. Never fails -- unreachable backends are
    /// reported through `ProbeResult::reachable`.
    fn health_probe(&self) -> impl std::future::Future<Output = ProbeResult> + Send;
}
