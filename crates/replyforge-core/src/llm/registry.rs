//! Provider registry: the fixed set of configured providers and their
//! health-aware ranking.
//!
//! Composition is fixed at startup from configuration and never mutated
//! afterwards; all mutable state (health, circuits) lives in the
//! [`HealthMonitor`]. Ranking sorts by health score descending, with ties
//! broken by static priority then by name for determinism.

use replyforge_types::llm::{ProviderClass, ProviderDescriptor};

use super::box_adapter::BoxProviderAdapter;
use super::health::HealthMonitor;

/// One configured provider: its immutable descriptor plus the adapter.
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub adapter: BoxProviderAdapter,
}

/// The fixed, read-heavy set of configured providers.
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new(entries: Vec<RegisteredProvider>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All configured provider names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.as_str())
            .collect()
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredProvider> {
        self.entries.iter().find(|e| e.descriptor.name == name)
    }

    /// The ranked candidate list for one dispatch.
    ///
    /// Filters out disabled providers, providers lacking streaming when
    /// `require_streaming` is set, providers of the wrong class when the
    /// request pins one, and circuit-open providers (score = -inf). The
    /// rest sort by score descending, then priority ascending, then name
    /// ascending. The returned snapshot is taken once per dispatch; health
    /// changes during the dispatch do not reorder it.
    pub fn ordered(
        &self,
        monitor: &HealthMonitor,
        require_streaming: bool,
        class: Option<ProviderClass>,
    ) -> Vec<&RegisteredProvider> {
        let mut candidates: Vec<(f64, &RegisteredProvider)> = self
            .entries
            .iter()
            .filter(|e| e.descriptor.enabled)
            .filter(|e| !require_streaming || e.descriptor.supports_streaming)
            .filter(|e| class.is_none_or(|c| e.descriptor.class == c))
            .map(|e| (monitor.score(&e.descriptor.name), e))
            .filter(|(score, _)| score.is_finite())
            .collect();

        candidates.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.descriptor.priority.cmp(&b.descriptor.priority))
                .then_with(|| a.descriptor.name.cmp(&b.descriptor.name))
        });

        candidates.into_iter().map(|(_, e)| e).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;

    use futures_util::Stream;

    use replyforge_types::config::HealthConfig;
    use replyforge_types::llm::{
        GenerationConstraints, GenerationOutput, ProbeResult, ProviderError, RenderedPrompt,
        TextChunk,
    };

    use super::*;
    use crate::llm::adapter::ProviderAdapter;

    struct NullAdapter {
        name: String,
    }

    impl ProviderAdapter for NullAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(
            &self,
            _prompt: &RenderedPrompt,
            _constraints: &GenerationConstraints,
        ) -> Result<GenerationOutput, ProviderError> {
            Err(ProviderError::Transport("null adapter".to_string()))
        }

        fn generate_stream(
            &self,
            _prompt: RenderedPrompt,
            _constraints: GenerationConstraints,
        ) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
            Box::pin(futures_util::stream::empty())
        }

        async fn health_probe(&self) -> ProbeResult {
            ProbeResult {
                reachable: false,
                latency_ms: 0,
            }
        }
    }

    fn descriptor(name: &str, priority: u32) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.to_string(),
            class: ProviderClass::OpenAi,
            model: format!("{name}-model"),
            supports_streaming: true,
            priority,
            timeout_ms: 30_000,
            max_retries: 1,
            enabled: true,
        }
    }

    fn entry(name: &str, priority: u32) -> RegisteredProvider {
        RegisteredProvider {
            descriptor: descriptor(name, priority),
            adapter: BoxProviderAdapter::new(NullAdapter {
                name: name.to_string(),
            }),
        }
    }

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(HealthConfig::default())
    }

    #[test]
    fn test_ordered_ties_broken_by_priority_then_name() {
        let registry = ProviderRegistry::new(vec![
            entry("charlie", 1),
            entry("alpha", 2),
            entry("bravo", 1),
        ]);
        let ordered = registry.ordered(&monitor(), false, None);
        let names: Vec<&str> = ordered.iter().map(|e| e.descriptor.name.as_str()).collect();
        // All fresh providers score identically; priority then name decides.
        assert_eq!(names, vec!["bravo", "charlie", "alpha"]);
    }

    #[test]
    fn test_ordered_ranks_healthy_above_failing() {
        let registry = ProviderRegistry::new(vec![entry("good", 1), entry("bad", 0)]);
        let m = monitor();
        let err = ProviderError::Transport("down".to_string());
        // Two failures: the circuit stays closed but the score drops.
        m.record_failure("bad", &err, 100);
        m.record_failure("bad", &err, 100);
        m.record_success("good", 100);

        let ordered = registry.ordered(&m, false, None);
        let names: Vec<&str> = ordered.iter().map(|e| e.descriptor.name.as_str()).collect();
        // "bad" has higher static priority but worse health.
        assert_eq!(names, vec!["good", "bad"]);
    }

    #[test]
    fn test_ordered_excludes_circuit_open() {
        let registry = ProviderRegistry::new(vec![entry("good", 1), entry("bad", 0)]);
        let m = monitor();
        let err = ProviderError::Transport("down".to_string());
        for _ in 0..3 {
            m.record_failure("bad", &err, 100);
        }

        let ordered = registry.ordered(&m, false, None);
        let names: Vec<&str> = ordered.iter().map(|e| e.descriptor.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn test_ordered_filters_streaming_capability() {
        let mut no_stream = entry("text-only", 0);
        no_stream.descriptor.supports_streaming = false;
        let registry = ProviderRegistry::new(vec![no_stream, entry("streamer", 1)]);

        let ordered = registry.ordered(&monitor(), true, None);
        let names: Vec<&str> = ordered.iter().map(|e| e.descriptor.name.as_str()).collect();
        assert_eq!(names, vec!["streamer"]);
    }

    #[test]
    fn test_ordered_filters_disabled() {
        let mut disabled = entry("off", 0);
        disabled.descriptor.enabled = false;
        let registry = ProviderRegistry::new(vec![disabled, entry("on", 1)]);

        let ordered = registry.ordered(&monitor(), false, None);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].descriptor.name, "on");
    }

    #[test]
    fn test_ordered_filters_pinned_class() {
        let mut claude = entry("anthropic", 0);
        claude.descriptor.class = ProviderClass::Claude;
        let registry = ProviderRegistry::new(vec![claude, entry("openai", 1)]);

        let ordered = registry.ordered(&monitor(), false, Some(ProviderClass::Claude));
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].descriptor.name, "anthropic");
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new(vec![]);
        assert!(registry.is_empty());
        assert!(registry.ordered(&monitor(), false, None).is_empty());
    }
}
