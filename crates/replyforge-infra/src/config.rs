//! Configuration loading and orchestrator bootstrap.
//!
//! Reads `replyforge.toml`, resolves API keys from per-provider
//! environment variables, and assembles the registry, health monitor,
//! cache, and dispatcher. A provider whose key cannot be resolved is
//! skipped with a warning (the original deployment treats unset keys as
//! "provider not available"); ending up with zero providers is the one
//! fatal condition.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;

use replyforge_core::cache::durable::BoxDurableStore;
use replyforge_core::cache::CacheLayer;
use replyforge_core::dispatch::Dispatcher;
use replyforge_core::llm::box_adapter::BoxProviderAdapter;
use replyforge_core::llm::health::HealthMonitor;
use replyforge_core::llm::registry::{ProviderRegistry, RegisteredProvider};
use replyforge_types::config::{OrchestratorConfig, ProviderConfig};
use replyforge_types::error::ConfigError;
use replyforge_types::llm::{ProviderClass, ProviderDescriptor};

use crate::llm::anthropic::AnthropicAdapter;
use crate::llm::openai_compat::{config as openai_config, OpenAiCompatAdapter};
use crate::sqlite::{DatabasePool, SqliteCacheStore};

/// Load orchestrator configuration from a TOML file.
///
/// A missing file yields the defaults (all knobs defaulted, zero
/// providers -- bootstrap will then fail with `NoProvidersConfigured`).
/// An unreadable or unparsable file is a fatal configuration error.
pub async fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(OrchestratorConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Io(format!("{}: {err}", path.display())));
        }
    };

    toml::from_str(&content)
        .map_err(|err| ConfigError::Invalid(format!("{}: {err}", path.display())))
}

/// The assembled orchestration layer, ready for a pipeline to use.
pub struct Orchestrator {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ProviderRegistry>,
    pub health: Arc<HealthMonitor>,
    pub cache: Arc<CacheLayer>,
}

/// Assemble the orchestration layer from configuration.
///
/// Fatal only when no provider survives key resolution. A configured but
/// unreachable durable cache tier degrades to volatile-only operation.
pub async fn bootstrap(config: &OrchestratorConfig) -> Result<Orchestrator, ConfigError> {
    let mut entries = Vec::new();

    for provider in config.providers.iter().filter(|p| p.enabled) {
        let api_key = match resolve_api_key(provider) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(provider = %provider.name, %err, "Skipping provider");
                continue;
            }
        };

        entries.push(RegisteredProvider {
            descriptor: descriptor_for(provider),
            adapter: build_adapter(provider, &api_key),
        });
        tracing::info!(
            provider = %provider.name,
            class = %provider.class,
            model = %provider.model,
            "Provider initialized"
        );
    }

    if entries.is_empty() {
        return Err(ConfigError::NoProvidersConfigured);
    }

    let health = Arc::new(HealthMonitor::new(config.health.clone()));
    for entry in &entries {
        health.register(&entry.descriptor.name);
    }
    let registry = Arc::new(ProviderRegistry::new(entries));

    let mut cache = CacheLayer::new(&config.cache);
    if let Some(url) = &config.database_url {
        match DatabasePool::new(url).await {
            Ok(pool) => {
                cache = cache.with_durable(BoxDurableStore::new(SqliteCacheStore::new(pool)));
            }
            Err(err) => {
                tracing::warn!(%err, "Durable cache tier unavailable; continuing volatile-only");
            }
        }
    }
    let cache = Arc::new(cache);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&health),
        Arc::clone(&cache),
        config.cache.default_ttl_secs,
    ));

    Ok(Orchestrator {
        dispatcher,
        registry,
        health,
        cache,
    })
}

/// Resolve a provider's API key from its configured environment variable.
fn resolve_api_key(provider: &ProviderConfig) -> Result<String, ConfigError> {
    let Some(env) = provider.api_key_env.as_deref() else {
        return Err(ConfigError::Invalid(format!(
            "provider '{}' has no api_key_env",
            provider.name
        )));
    };
    std::env::var(env).map_err(|_| ConfigError::MissingApiKey {
        provider: provider.name.clone(),
        env: env.to_string(),
    })
}

fn descriptor_for(provider: &ProviderConfig) -> ProviderDescriptor {
    ProviderDescriptor {
        name: provider.name.clone(),
        class: provider.class,
        model: provider.model.clone(),
        supports_streaming: provider.streaming,
        priority: provider.priority,
        timeout_ms: provider.timeout_ms,
        max_retries: provider.max_retries,
        enabled: provider.enabled,
    }
}

fn build_adapter(provider: &ProviderConfig, api_key: &str) -> BoxProviderAdapter {
    match provider.class {
        ProviderClass::Claude => {
            let mut adapter = AnthropicAdapter::new(
                SecretString::from(api_key.to_string()),
                provider.model.clone(),
            );
            if let Some(base_url) = &provider.base_url {
                adapter = adapter.with_base_url(base_url.clone());
            }
            BoxProviderAdapter::new(adapter)
        }
        ProviderClass::OpenAi | ProviderClass::Llama | ProviderClass::Gemini => {
            let mut config = match provider.class {
                ProviderClass::OpenAi => openai_config::openai_defaults(api_key, &provider.model),
                ProviderClass::Llama => openai_config::groq_defaults(api_key, &provider.model),
                _ => openai_config::gemini_defaults(api_key, &provider.model),
            };
            config.provider_name = provider.name.clone();
            if let Some(base_url) = &provider.base_url {
                config.base_url = base_url.clone();
            }
            BoxProviderAdapter::new(OpenAiCompatAdapter::new(config))
        }
    }
}
