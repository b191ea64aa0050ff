//! StreamChannel: a single dispatcher invocation exposed as incremental
//! chunks with cancellation.
//!
//! Wraps the dispatch steps after the cache check for the single
//! best-ranked streaming-capable provider only -- there is no mid-stream
//! provider fallback, since partial output cannot be safely spliced across
//! providers. The chunk sequence is finite and terminated by either a
//! completion marker or an error marker. Cancellation stops chunk
//! production promptly, releases the per-fingerprint lock, and never
//! writes a partial stream to the cache.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use replyforge_types::cache::CachePayload;
use replyforge_types::dispatch::{
    AttemptOutcome, DispatchAttempt, GenerationRequest, GenerationResult,
};
use replyforge_types::llm::ProviderError;

use crate::dispatch::{detect_json_object, Dispatcher, FlightRole};

/// One item of a reply stream.
#[derive(Debug)]
pub enum StreamItem {
    /// Incremental text.
    Delta(String),
    /// Completion marker: the stream finished cleanly and this is the
    /// final result (also written to the cache).
    Completed(GenerationResult),
    /// Error marker: the stream terminated without a usable result.
    Failed {
        provider: Option<String>,
        message: String,
    },
}

/// A cancellable stream of reply chunks for one generation request.
pub struct StreamChannel {
    chunks: Pin<Box<dyn Stream<Item = StreamItem> + Send + 'static>>,
    cancel: CancellationToken,
}

impl StreamChannel {
    /// Open a streaming dispatch for the request.
    ///
    /// Selection happens lazily when the stream is first polled. If another
    /// dispatch for the same fingerprint is already in flight, this stream
    /// waits for its result and replays it as a single delta plus the
    /// completion marker rather than issuing a duplicate provider call.
    pub fn open(dispatcher: Arc<Dispatcher>, request: GenerationRequest) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let chunks = Box::pin(async_stream::stream! {
            loop {
                match dispatcher.begin_flight(&request.fingerprint) {
                    FlightRole::Follower(mut rx) => {
                        let shared = tokio::select! {
                            _ = token.cancelled() => return,
                            waited = rx.wait_for(|r| r.is_some()) => {
                                waited.ok().and_then(|value| value.clone())
                            }
                        };
                        match shared {
                            Some(result) => {
                                if !result.text.is_empty() {
                                    yield StreamItem::Delta(result.text.clone());
                                }
                                yield StreamItem::Completed(result);
                                return;
                            }
                            // The leader abandoned the flight; re-elect.
                            None => continue,
                        }
                    }
                    FlightRole::Leader { tx, guard } => {
                        let selection = {
                            let health = dispatcher.health();
                            let ranked = dispatcher.registry().ordered(
                                health,
                                true,
                                request.model_class,
                            );
                            let mut found = None;
                            for candidate in ranked {
                                if let Some(permit) =
                                    health.begin_attempt(&candidate.descriptor.name)
                                {
                                    found = Some((candidate, permit));
                                    break;
                                }
                            }
                            found.map(|(candidate, permit)| {
                                (
                                    candidate.descriptor.clone(),
                                    permit,
                                    candidate.adapter.generate_stream(
                                        request.prompt.clone(),
                                        request.constraints,
                                    ),
                                )
                            })
                        };

                        let Some((descriptor, permit, mut inner)) = selection else {
                            drop(guard);
                            tracing::warn!(
                                fingerprint = %request.fingerprint,
                                "No streaming-capable provider available"
                            );
                            yield StreamItem::Failed {
                                provider: None,
                                message: "no streaming-capable provider available".to_string(),
                            };
                            return;
                        };

                        let provider = descriptor.name.clone();
                        let chunk_timeout = Duration::from_millis(descriptor.timeout_ms);
                        let started = Instant::now();
                        let mut assembled = String::new();

                        loop {
                            // The per-provider timeout bounds the wait for
                            // each chunk, so a hung stream is detected.
                            let next = tokio::select! {
                                _ = token.cancelled() => {
                                    tracing::debug!(
                                        provider = %provider,
                                        "Stream cancelled by caller"
                                    );
                                    // No outcome will be recorded; release
                                    // a half-open probe slot if this call
                                    // held one.
                                    if permit.probe {
                                        dispatcher.health().abandon_probe(&provider);
                                    }
                                    return;
                                }
                                next = tokio::time::timeout(chunk_timeout, inner.next()) => next,
                            };

                            let err = match next {
                                Ok(Some(Ok(chunk))) => {
                                    if !chunk.text.is_empty() {
                                        assembled.push_str(&chunk.text);
                                        yield StreamItem::Delta(chunk.text);
                                    }
                                    if !chunk.done {
                                        continue;
                                    }

                                    let latency_ms = started.elapsed().as_millis() as u64;
                                    dispatcher.health().record_success(&provider, latency_ms);

                                    let structured = detect_json_object(&assembled);
                                    dispatcher
                                        .cache()
                                        .put(
                                            request.fingerprint.clone(),
                                            CachePayload {
                                                text: assembled.clone(),
                                                structured_fields: structured.clone(),
                                                provider: provider.clone(),
                                            },
                                            dispatcher.default_ttl_secs(),
                                        )
                                        .await;

                                    let result = GenerationResult {
                                        provider_used: Some(provider.clone()),
                                        text: assembled.clone(),
                                        structured_fields: structured,
                                        cache_hit: false,
                                        attempts: vec![DispatchAttempt {
                                            provider: provider.clone(),
                                            outcome: AttemptOutcome::Success,
                                            latency_ms,
                                        }],
                                    };
                                    let _ = tx.send(Some(result.clone()));
                                    drop(guard);
                                    yield StreamItem::Completed(result);
                                    return;
                                }
                                Ok(Some(Err(err))) => err,
                                Ok(None) => ProviderError::MalformedResponse(
                                    "stream ended without terminal chunk".to_string(),
                                ),
                                Err(_elapsed) => ProviderError::Timeout {
                                    timeout_ms: descriptor.timeout_ms,
                                },
                            };

                            let latency_ms = started.elapsed().as_millis() as u64;
                            dispatcher.health().record_failure(&provider, &err, latency_ms);
                            tracing::warn!(provider = %provider, error = %err, "Stream failed");
                            yield StreamItem::Failed {
                                provider: Some(provider.clone()),
                                message: err.to_string(),
                            };
                            return;
                        }
                    }
                }
            }
        });

        Self { chunks, cancel }
    }

    /// A token that cancels this stream when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the stream: chunk production stops promptly and nothing is
    /// written to the cache.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for StreamChannel {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.as_mut().poll_next(cx)
    }
}
