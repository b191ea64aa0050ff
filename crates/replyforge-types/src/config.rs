//! Orchestrator configuration types.
//!
//! Deserialized from `replyforge.toml`; every knob has a serde default so
//! a missing file or a partial file still yields a working configuration.
//! API keys are NOT stored here -- each provider names the environment
//! variable holding its key, resolved at bootstrap.

use serde::{Deserialize, Serialize};

use crate::llm::ProviderClass;

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g., "openai", "groq").
    pub name: String,
    /// Backend class for this provider.
    pub class: ProviderClass,
    /// Model identifier to request.
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Override the default base URL for the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Static priority for ranking ties; lower = preferred.
    #[serde(default)]
    pub priority: u32,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries against this provider before failing over.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whether this provider can serve streaming generations.
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Cache tier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL for entries written on dispatch success.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Volatile-tier capacity; the oldest entry is evicted beyond this.
    #[serde(default = "default_max_volatile_entries")]
    pub max_volatile_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            max_volatile_entries: default_max_volatile_entries(),
        }
    }
}

/// Health scoring and circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Initial open-circuit cooldown.
    #[serde(default = "default_base_cooldown_ms")]
    pub base_cooldown_ms: u64,
    /// Cooldown ceiling for repeated half-open probe failures.
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: u64,
    /// Half-life for the exponential decay of windowed success/failure
    /// counts, so stale failures stop penalizing a recovered provider.
    #[serde(default = "default_decay_half_life_secs")]
    pub decay_half_life_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_cooldown_ms: default_base_cooldown_ms(),
            max_cooldown_ms: default_max_cooldown_ms(),
            decay_half_life_secs: default_decay_half_life_secs(),
        }
    }
}

/// Batch execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

/// Default generation constraints applied by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub generation: GenerationDefaults,
    /// SQLite URL for the durable cache tier; `None` = volatile-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_volatile_entries() -> usize {
    1000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_base_cooldown_ms() -> u64 {
    30_000
}

fn default_max_cooldown_ms() -> u64 {
    300_000
}

fn default_decay_half_life_secs() -> u64 {
    300
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f64 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_gets_defaults() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert!(config.providers.is_empty());
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.cache.max_volatile_entries, 1000);
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.health.base_cooldown_ms, 30_000);
        assert_eq!(config.health.max_cooldown_ms, 300_000);
        assert_eq!(config.batch.concurrency_limit, 4);
        assert_eq!(config.generation.max_tokens, 2000);
        assert!((config.generation.temperature - 0.7).abs() < f64::EPSILON);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_provider_config_defaults() {
        let toml_str = r#"
[[providers]]
name = "openai"
class = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;
        let config: OrchestratorConfig = toml::from_str(toml_str).unwrap();
        let p = &config.providers[0];
        assert_eq!(p.priority, 0);
        assert_eq!(p.timeout_ms, 30_000);
        assert_eq!(p.max_retries, 1);
        assert!(p.streaming);
        assert!(p.enabled);
    }

    #[test]
    fn test_provider_config_overrides() {
        let toml_str = r#"
[[providers]]
name = "groq"
class = "llama"
model = "llama-3.1-8b-instant"
api_key_env = "GROQ_API_KEY"
priority = 2
timeout_ms = 10000
max_retries = 0
streaming = false
enabled = false
"#;
        let config: OrchestratorConfig = toml::from_str(toml_str).unwrap();
        let p = &config.providers[0];
        assert_eq!(p.class, ProviderClass::Llama);
        assert_eq!(p.priority, 2);
        assert_eq!(p.timeout_ms, 10_000);
        assert_eq!(p.max_retries, 0);
        assert!(!p.streaming);
        assert!(!p.enabled);
    }
}
