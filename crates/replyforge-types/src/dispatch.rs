//! Dispatch request/result types.
//!
//! A [`GenerationRequest`] is created once per inbound message and is
//! immutable during dispatch. The [`GenerationResult`] records which
//! provider answered (or that the fallback template was used) along with
//! the full ordered attempt history.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::llm::{GenerationConstraints, ProviderClass, ProviderErrorKind, RenderedPrompt};
use crate::message::Classification;

/// Deterministic identity of a semantically equivalent generation request.
///
/// Lowercase hex SHA-256 over the canonical request form. Used as the cache
/// key and as the single-flight deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Wrap an already-computed hex digest.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully prepared generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: Uuid,
    pub fingerprint: RequestFingerprint,
    pub prompt: RenderedPrompt,
    pub classification: Classification,
    pub constraints: GenerationConstraints,
    /// Restrict dispatch to providers of this class. `None` = any class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_class: Option<ProviderClass>,
}

/// Outcome of one provider attempt during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure { kind: ProviderErrorKind },
}

/// One entry in the ordered attempt history of a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub provider: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

/// The result of dispatching one generation request.
///
/// Produced once and never mutated after return. Provider exhaustion is
/// represented as a fallback result (`provider_used = None`), not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Provider that produced the text; `None` when the deterministic
    /// fallback template was used.
    pub provider_used: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_fields: Option<serde_json::Value>,
    pub cache_hit: bool,
    pub attempts: Vec<DispatchAttempt>,
}

impl GenerationResult {
    /// Whether this result is the deterministic fallback template.
    pub fn is_fallback(&self) -> bool {
        self.provider_used.is_none() && !self.cache_hit
    }
}

/// A batch of generation requests to run under a concurrency ceiling.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Ordered items; results are reported in the same order.
    pub items: Vec<GenerationRequest>,
    pub concurrency_limit: usize,
}
