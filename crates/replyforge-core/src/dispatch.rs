//! The dispatcher: cache-aware, health-aware provider orchestration.
//!
//! One dispatch walks the state machine received -> cache_check ->
//! (hit -> done) | (miss -> dispatching) -> succeeded | exhausted -> done.
//! A per-fingerprint single-flight lock guarantees at most one concurrent
//! generation per fingerprint: concurrent callers with the same fingerprint
//! wait for the first caller's result instead of issuing duplicate provider
//! calls. Exhaustion produces a deterministic fallback reply, never an
//! error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::Instrument;

use replyforge_types::cache::CachePayload;
use replyforge_types::dispatch::{
    AttemptOutcome, DispatchAttempt, GenerationRequest, GenerationResult, RequestFingerprint,
};
use replyforge_types::llm::ProviderError;

use crate::cache::CacheLayer;
use crate::llm::health::HealthMonitor;
use crate::llm::registry::ProviderRegistry;

type FlightReceiver = watch::Receiver<Option<GenerationResult>>;

/// Outcome of single-flight leader election for one fingerprint.
pub(crate) enum FlightRole {
    /// This caller performs the real dispatch and publishes the result.
    Leader {
        tx: watch::Sender<Option<GenerationResult>>,
        guard: FlightGuard,
    },
    /// Another caller is already dispatching this fingerprint.
    Follower(FlightReceiver),
}

/// Releases the single-flight entry when the leader finishes or aborts.
///
/// Removal on `Drop` means a cancelled leader (a dropped stream) releases
/// waiters without publishing a result.
pub(crate) struct FlightGuard {
    inflight: Arc<DashMap<RequestFingerprint, FlightReceiver>>,
    fingerprint: RequestFingerprint,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inflight.remove(&self.fingerprint);
    }
}

/// Orchestrates generation requests across the configured providers.
///
/// Holds shared handles to the registry (read-only ranking snapshots),
/// the health monitor (outcome recording), and the cache layer.
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthMonitor>,
    cache: Arc<CacheLayer>,
    inflight: Arc<DashMap<RequestFingerprint, FlightReceiver>>,
    default_ttl_secs: u64,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthMonitor>,
        cache: Arc<CacheLayer>,
        default_ttl_secs: u64,
    ) -> Self {
        Self {
            registry,
            health,
            cache,
            inflight: Arc::new(DashMap::new()),
            default_ttl_secs,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub(crate) fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Dispatch one generation request.
    ///
    /// Infallible by design: every path returns a usable result -- a cache
    /// hit, a provider generation, or the deterministic fallback reply.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        loop {
            if let Some(entry) = self.cache.get(&request.fingerprint).await {
                return GenerationResult {
                    provider_used: Some(entry.payload.provider),
                    text: entry.payload.text,
                    structured_fields: entry.payload.structured_fields,
                    cache_hit: true,
                    attempts: Vec::new(),
                };
            }

            match self.begin_flight(&request.fingerprint) {
                FlightRole::Leader { tx, guard } => {
                    let result = self.dispatch_providers(request).await;
                    // Publish to waiters before the guard releases the entry.
                    let _ = tx.send(Some(result.clone()));
                    drop(guard);
                    return result;
                }
                FlightRole::Follower(mut rx) => {
                    if let Ok(value) = rx.wait_for(|result| result.is_some()).await {
                        if let Some(result) = value.clone() {
                            return result;
                        }
                    }
                    // The leader abandoned the flight without publishing
                    // (cancelled stream). Re-check the cache and retry.
                }
            }
        }
    }

    /// Elect this caller leader for the fingerprint, or hand back the
    /// in-flight receiver to wait on.
    pub(crate) fn begin_flight(&self, fingerprint: &RequestFingerprint) -> FlightRole {
        use dashmap::mapref::entry::Entry;

        match self.inflight.entry(fingerprint.clone()) {
            Entry::Occupied(entry) => FlightRole::Follower(entry.get().clone()),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                FlightRole::Leader {
                    tx,
                    guard: FlightGuard {
                        inflight: Arc::clone(&self.inflight),
                        fingerprint: fingerprint.clone(),
                    },
                }
            }
        }
    }

    /// Walk the ranked candidate list until one provider succeeds.
    async fn dispatch_providers(&self, request: &GenerationRequest) -> GenerationResult {
        let candidates = self
            .registry
            .ordered(&self.health, false, request.model_class);
        let mut attempts: Vec<DispatchAttempt> = Vec::new();

        for candidate in candidates {
            let descriptor = &candidate.descriptor;
            let name = descriptor.name.as_str();

            let Some(permit) = self.health.begin_attempt(name) else {
                tracing::debug!(provider = %name, "Provider unavailable, skipping");
                continue;
            };
            // A half-open probe gets exactly one trial, no retries.
            let tries = if permit.probe {
                1
            } else {
                descriptor.max_retries + 1
            };

            for attempt_no in 1..=tries {
                let span = tracing::info_span!(
                    "gen_ai.generate",
                    gen_ai.provider.name = %name,
                    gen_ai.request.model = %descriptor.model,
                    gen_ai.request.max_tokens = request.constraints.max_tokens,
                    gen_ai.request.temperature = request.constraints.temperature,
                );

                let started = Instant::now();
                let outcome = tokio::time::timeout(
                    Duration::from_millis(descriptor.timeout_ms),
                    candidate
                        .adapter
                        .generate(&request.prompt, &request.constraints)
                        .instrument(span),
                )
                .await;
                let latency_ms = started.elapsed().as_millis() as u64;

                let err = match outcome {
                    Ok(Ok(output)) => {
                        self.health.record_success(name, latency_ms);
                        attempts.push(DispatchAttempt {
                            provider: name.to_string(),
                            outcome: AttemptOutcome::Success,
                            latency_ms,
                        });

                        let structured = output
                            .structured_fields
                            .or_else(|| detect_json_object(&output.text));
                        self.cache
                            .put(
                                request.fingerprint.clone(),
                                CachePayload {
                                    text: output.text.clone(),
                                    structured_fields: structured.clone(),
                                    provider: name.to_string(),
                                },
                                self.default_ttl_secs,
                            )
                            .await;

                        return GenerationResult {
                            provider_used: Some(name.to_string()),
                            text: output.text,
                            structured_fields: structured,
                            cache_hit: false,
                            attempts,
                        };
                    }
                    Ok(Err(err)) => err,
                    Err(_elapsed) => ProviderError::Timeout {
                        timeout_ms: descriptor.timeout_ms,
                    },
                };

                self.health.record_failure(name, &err, latency_ms);
                attempts.push(DispatchAttempt {
                    provider: name.to_string(),
                    outcome: AttemptOutcome::Failure { kind: err.kind() },
                    latency_ms,
                });
                tracing::warn!(
                    provider = %name,
                    attempt = attempt_no,
                    error = %err,
                    "Provider call failed, continuing"
                );

                // The recorded failure may have opened the circuit; stop
                // burning retries against it.
                if self.health.score(name) == f64::NEG_INFINITY {
                    break;
                }
            }
        }

        tracing::error!(
            fingerprint = %request.fingerprint,
            attempts = attempts.len(),
            "All providers exhausted, returning fallback reply"
        );
        GenerationResult {
            provider_used: None,
            text: fallback::fallback_text(&request.classification),
            structured_fields: None,
            cache_hit: false,
            attempts,
        }
    }
}

/// Providers asked for JSON sometimes comply and sometimes answer in
/// prose. Surface a parsed object when the text is one, and nothing
/// otherwise -- downstream code falls back to the raw text.
pub(crate) fn detect_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .filter(|v| v.is_object())
}

/// Deterministic fallback replies used when every provider is exhausted.
///
/// Templates are non-personalized on purpose: repeated exhaustion for the
/// same input yields byte-identical payloads.
pub mod fallback {
    use replyforge_types::message::{Classification, Intent};

    const NEW_LEAD_BODY: &str = "Hello,\n\nThank you for reaching out -- we're excited about your interest. A member of our team will contact you shortly with a personal introduction to our services.\n\nWarm regards,\nThe Team";

    const SALES_BODY: &str = "Hello,\n\nThank you for your interest! Our team will contact you shortly to discuss your requirements.\n\nBest regards,\nThe Team";

    const SUPPORT_BODY: &str = "Hello,\n\nThank you for reaching out. We've received your support request and will get back to you within 24 hours.\n\nBest regards,\nThe Support Team";

    const GENERAL_BODY: &str = "Hello,\n\nThank you for your email. We'll review your message and get back to you soon.\n\nBest regards,\nThe Team";

    /// The templated reply body for the given classification.
    pub fn fallback_text(classification: &Classification) -> String {
        if classification.customer_type.is_new_lead() {
            return NEW_LEAD_BODY.to_string();
        }
        match classification.intent {
            Intent::Sales => SALES_BODY.to_string(),
            Intent::Support => SUPPORT_BODY.to_string(),
            Intent::Partnership | Intent::General => GENERAL_BODY.to_string(),
        }
    }
}
