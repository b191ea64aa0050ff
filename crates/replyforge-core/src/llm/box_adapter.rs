//! BoxProviderAdapter -- object-safe dynamic dispatch wrapper for
//! ProviderAdapter.
//!
//! 1. Define an object-safe `ProviderAdapterDyn` trait with boxed futures
//! 2. Blanket-impl `ProviderAdapterDyn` for all `T: ProviderAdapter`
//! 3. `BoxProviderAdapter` wraps `Box<dyn ProviderAdapterDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use replyforge_types::llm::{
    GenerationConstraints, GenerationOutput, ProbeResult, ProviderError, RenderedPrompt, TextChunk,
};

use super::adapter::ProviderAdapter;

/// Object-safe version of [`ProviderAdapter`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch
/// (`dyn ProviderAdapterDyn`). A blanket implementation is provided for
/// all types implementing `ProviderAdapter`.
pub trait ProviderAdapterDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a RenderedPrompt,
        constraints: &'a GenerationConstraints,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutput, ProviderError>> + Send + 'a>>;

    fn generate_stream_boxed(
        &self,
        prompt: RenderedPrompt,
        constraints: GenerationConstraints,
    ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>>;

    fn health_probe_boxed(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>>;
}

/// Blanket implementation: any `ProviderAdapter` automatically implements
/// `ProviderAdapterDyn`.
impl<T: ProviderAdapter> ProviderAdapterDyn for T {
    fn name(&self) -> &str {
        ProviderAdapter::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a RenderedPrompt,
        constraints: &'a GenerationConstraints,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutput, ProviderError>> + Send + 'a>> {
        Box::pin(self.generate(prompt, constraints))
    }

    fn generate_stream_boxed(
        &self,
        prompt: RenderedPrompt,
        constraints: GenerationConstraints,
    ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
        self.generate_stream(prompt, constraints)
    }

    fn health_probe_boxed(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>> {
        Box::pin(self.health_probe())
    }
}

/// Type-erased provider adapter for runtime heterogeneity.
///
/// Wraps any `ProviderAdapter` implementation behind dynamic dispatch so
/// the registry can hold a mixed set of backends. Since `ProviderAdapter`
/// uses RPITIT, it cannot be used as a trait object directly;
/// `BoxProviderAdapter` provides equivalent methods that delegate to the
/// inner `ProviderAdapterDyn` trait object.
pub struct BoxProviderAdapter {
    inner: Box<dyn ProviderAdapterDyn + Send + Sync>,
}

impl BoxProviderAdapter {
    /// Wrap a concrete `ProviderAdapter` in a type-erased box.
    pub fn new<T: ProviderAdapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Box::new(adapter),
        }
    }

    /// Human-readable provider name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Send a generation request and receive the full output.
    pub async fn generate(
        &self,
        prompt: &RenderedPrompt,
        constraints: &GenerationConstraints,
    ) -> Result<GenerationOutput, ProviderError> {
        self.inner.generate_boxed(prompt, constraints).await
    }

    /// Start a streaming generation.
    pub fn generate_stream(
        &self,
        prompt: RenderedPrompt,
        constraints: GenerationConstraints,
    ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
        self.inner.generate_stream_boxed(prompt, constraints)
    }

    /// Cheap reachability check.
    pub async fn health_probe(&self) -> ProbeResult {
        self.inner.health_probe_boxed().await
    }
}
