//! The message pipeline: inbound message in, well-formed reply out.
//!
//! Control flow per message: intent classification (hint or rule engine)
//! -> CRM lookup -> prompt render -> fingerprint -> dispatch. The caller
//! always receives a usable reply; provider exhaustion degrades to the
//! deterministic fallback template, never to an error.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use replyforge_types::config::{BatchConfig, GenerationDefaults};
use replyforge_types::dispatch::{GenerationRequest, GenerationResult};
use replyforge_types::llm::GenerationConstraints;
use replyforge_types::message::{
    Classification, CustomerType, InboundMessage, ProcessedReply, ReplyChunk, ReplyStatus,
};

use crate::batch::BatchCoordinator;
use crate::classify::{CrmStore, IntentClassifier};
use crate::dispatch::{fallback, Dispatcher};
use crate::fingerprint::fingerprint;
use crate::prompt;
use crate::stream::{StreamChannel, StreamItem};

/// A cancellable stream of [`ReplyChunk`]s for one inbound message.
pub struct ReplyStream {
    chunks: Pin<Box<dyn Stream<Item = ReplyChunk> + Send + 'static>>,
    cancel: CancellationToken,
}

impl ReplyStream {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ReplyStream {
    type Item = ReplyChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.as_mut().poll_next(cx)
    }
}

/// Turns inbound messages into replies through the dispatcher.
///
/// Generic over `C: CrmStore` so the embedding application injects its
/// record store (or an in-memory double for tests).
pub struct MessagePipeline<C: CrmStore> {
    dispatcher: Arc<Dispatcher>,
    coordinator: BatchCoordinator,
    classifier: IntentClassifier,
    crm: C,
    generation: GenerationDefaults,
}

impl<C: CrmStore> MessagePipeline<C> {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        crm: C,
        generation: GenerationDefaults,
        batch: BatchConfig,
    ) -> Self {
        let coordinator = BatchCoordinator::new(Arc::clone(&dispatcher), batch.concurrency_limit);
        Self {
            dispatcher,
            coordinator,
            classifier: IntentClassifier::new(),
            crm,
            generation,
        }
    }

    /// Process one inbound message to a complete reply.
    pub async fn process(&self, message: InboundMessage) -> ProcessedReply {
        let classification = self.classify(&message).await;
        tracing::info!(
            sender = %message.sender,
            intent = %classification.intent,
            customer_type = %classification.customer_type,
            "Processing inbound message"
        );

        let request = self.build_request(&message, classification);
        let result = self.dispatcher.generate(&request).await;
        build_reply(&message, classification, result)
    }

    /// Process a batch of inbound messages, index-aligned in and out.
    pub async fn process_batch(&self, messages: Vec<InboundMessage>) -> Vec<ProcessedReply> {
        let mut classifications = Vec::with_capacity(messages.len());
        for message in &messages {
            classifications.push(self.classify(message).await);
        }

        let items: Vec<GenerationRequest> = messages
            .iter()
            .zip(&classifications)
            .map(|(message, classification)| self.build_request(message, *classification))
            .collect();

        let results = self.coordinator.run_requests(items).await;

        messages
            .into_iter()
            .zip(classifications)
            .zip(results)
            .map(|((message, classification), result)| {
                build_reply(&message, classification, result)
            })
            .collect()
    }

    /// Process one inbound message as a chunk stream.
    ///
    /// The final chunk carries `done = true` and the full reply metadata.
    /// A failed stream degrades to the deterministic fallback reply in the
    /// final chunk rather than erroring.
    pub async fn process_stream(&self, message: InboundMessage) -> ReplyStream {
        let classification = self.classify(&message).await;
        let request = self.build_request(&message, classification);

        let channel = StreamChannel::open(Arc::clone(&self.dispatcher), request);
        let cancel = channel.cancellation_token();

        let chunks = Box::pin(async_stream::stream! {
            let mut channel = channel;
            while let Some(item) = channel.next().await {
                match item {
                    StreamItem::Delta(text) => {
                        yield ReplyChunk {
                            text_delta: text,
                            done: false,
                            metadata: None,
                        };
                    }
                    StreamItem::Completed(result) => {
                        let reply = build_reply(&message, classification, result);
                        yield ReplyChunk {
                            text_delta: String::new(),
                            done: true,
                            metadata: Some(reply),
                        };
                        return;
                    }
                    StreamItem::Failed { provider, message: why } => {
                        tracing::warn!(
                            ?provider,
                            error = %why,
                            "Stream failed, degrading to fallback reply"
                        );
                        let result = GenerationResult {
                            provider_used: None,
                            text: fallback::fallback_text(&classification),
                            structured_fields: None,
                            cache_hit: false,
                            attempts: Vec::new(),
                        };
                        let reply = build_reply(&message, classification, result);
                        yield ReplyChunk {
                            text_delta: String::new(),
                            done: true,
                            metadata: Some(reply),
                        };
                        return;
                    }
                }
            }
        });

        ReplyStream { chunks, cancel }
    }

    async fn classify(&self, message: &InboundMessage) -> Classification {
        let intent = self.classifier.classify(message);
        let customer_type = match self.crm.find_by_email(&message.sender).await {
            Some(record) => record.customer_type,
            None => CustomerType::NewLead,
        };
        Classification {
            intent,
            customer_type,
        }
    }

    fn build_request(
        &self,
        message: &InboundMessage,
        classification: Classification,
    ) -> GenerationRequest {
        let prompt = prompt::build_reply_prompt(message, &classification);
        let constraints = GenerationConstraints {
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };
        GenerationRequest {
            id: Uuid::now_v7(),
            fingerprint: fingerprint(&prompt, &constraints, None),
            prompt,
            classification,
            constraints,
            model_class: None,
        }
    }

}

/// Shape a dispatch result into the outbound reply contract.
///
/// A structured provider response may carry its own subject/body;
/// otherwise the subject comes from the template and the body from the
/// raw text.
fn build_reply(
    message: &InboundMessage,
    classification: Classification,
    result: GenerationResult,
) -> ProcessedReply {
    let structured = result.structured_fields.as_ref();
    let reply_subject = structured
        .and_then(|v| v.get("subject"))
        .and_then(|s| s.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| prompt::reply_subject(&message.subject, &classification));
    let reply_body = structured
        .and_then(|v| v.get("body"))
        .and_then(|s| s.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| result.text.clone());

    ProcessedReply {
        status: ReplyStatus::Processed,
        to: message.sender.clone(),
        reply_subject,
        reply_body,
        intent: classification.intent,
        customer_type: classification.customer_type,
        is_new_lead: classification.customer_type.is_new_lead(),
        provider_used: result.provider_used,
        cache_hit: result.cache_hit,
        attempts: result.attempts,
        processed_at: Utc::now(),
    }
}
