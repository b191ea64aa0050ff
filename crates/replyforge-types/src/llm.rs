//! Provider-level types for Replyforge.
//!
//! These types model the data shapes for LLM provider interactions:
//! rendered prompts, generation constraints and outputs, streaming text
//! chunks, health probes, and the provider error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class of LLM backend a provider belongs to.
///
/// The dispatcher never branches on provider identity -- the class exists
/// for capability-compatible cache keys and for pinning a request to a
/// family of models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderClass {
    OpenAi,
    Llama,
    Gemini,
    Claude,
}

impl fmt::Display for ProviderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderClass::OpenAi => write!(f, "openai"),
            ProviderClass::Llama => write!(f, "llama"),
            ProviderClass::Gemini => write!(f, "gemini"),
            ProviderClass::Claude => write!(f, "claude"),
        }
    }
}

impl FromStr for ProviderClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderClass::OpenAi),
            "llama" => Ok(ProviderClass::Llama),
            "gemini" => Ok(ProviderClass::Gemini),
            "claude" => Ok(ProviderClass::Claude),
            other => Err(format!("invalid provider class: '{other}'")),
        }
    }
}

/// A prompt rendered and ready for a provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPrompt {
    /// Optional system prompt establishing the assistant's role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The user-visible prompt content.
    pub user: String,
}

/// Provider-agnostic generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConstraints {
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Token usage for a single provider call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Output of a successful non-streaming generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Generated text.
    pub text: String,
    /// Structured fields extracted by the provider, when the prompt asked
    /// for JSON output and the response parsed cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_fields: Option<serde_json::Value>,
    /// Model identifier reported by the provider.
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
}

/// One increment of a streaming generation.
///
/// Streams are finite and not restartable; the last chunk carries
/// `done = true` (possibly with an empty `text`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub done: bool,
}

/// Result of a provider health probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency_ms: u64,
}

/// Errors from provider operations.
///
/// All variants drive fallback progression in the dispatcher; none of
/// them ever surfaces to the pipeline caller.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("authentication rejected by provider")]
    Auth,

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider call exceeded {timeout_ms}ms timeout")]
    Timeout { timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// The serializable kind for attempt records and logs.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Auth => ProviderErrorKind::Auth,
            ProviderError::RateLimited { .. } => ProviderErrorKind::RateLimit,
            ProviderError::Timeout { .. } => ProviderErrorKind::Timeout,
            ProviderError::Transport(_) => ProviderErrorKind::Transport,
            ProviderError::MalformedResponse(_) => ProviderErrorKind::MalformedResponse,
        }
    }
}

/// Flat classification of a [`ProviderError`], carried in attempt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Auth,
    RateLimit,
    Timeout,
    Transport,
    MalformedResponse,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Auth => write!(f, "auth"),
            ProviderErrorKind::RateLimit => write!(f, "rate_limit"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Transport => write!(f, "transport"),
            ProviderErrorKind::MalformedResponse => write!(f, "malformed_response"),
        }
    }
}

/// Static description of one configured provider.
///
/// Immutable after load; owned by the registry. Health state lives in the
/// health monitor, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name (e.g., "openai", "groq").
    pub name: String,
    /// Backend class for this provider.
    pub class: ProviderClass,
    /// Model identifier to request.
    pub model: String,
    /// Whether this provider can serve streaming generations.
    pub supports_streaming: bool,
    /// Static priority for ranking ties; lower = preferred.
    pub priority: u32,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries against this provider before advancing to the next candidate.
    pub max_retries: u32,
    /// Disabled providers are never ranked.
    pub enabled: bool,
}

/// Point-in-time health of one provider, for the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthInfo {
    pub name: String,
    /// One of "closed", "open", "half_open".
    pub circuit_state: String,
    /// Ranking score at snapshot time; `None` while the circuit is open.
    pub score: Option<f64>,
    pub last_error: Option<String>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
}
