//! Bounded-concurrency batch execution.
//!
//! Fans a batch of generation requests out through the dispatcher under a
//! concurrency ceiling. Items are fully isolated: one item exhausting its
//! providers (itself a successful fallback) never affects its siblings.
//! Output order always matches input order, regardless of completion
//! order.

use std::sync::Arc;

use futures_util::StreamExt;

use replyforge_types::dispatch::{BatchJob, GenerationRequest, GenerationResult};

use crate::dispatch::Dispatcher;

pub struct BatchCoordinator {
    dispatcher: Arc<Dispatcher>,
    /// Ceiling applied when a job does not carry its own.
    default_concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(dispatcher: Arc<Dispatcher>, default_concurrency: usize) -> Self {
        Self {
            dispatcher,
            default_concurrency: default_concurrency.max(1),
        }
    }

    /// Run every item of the job, preserving input order in the output.
    pub async fn run(&self, job: BatchJob) -> Vec<GenerationResult> {
        let limit = if job.concurrency_limit == 0 {
            self.default_concurrency
        } else {
            job.concurrency_limit
        };
        self.run_items(job.items, limit).await
    }

    /// Run the items under the coordinator's default ceiling.
    pub async fn run_requests(&self, items: Vec<GenerationRequest>) -> Vec<GenerationResult> {
        self.run_items(items, self.default_concurrency).await
    }

    async fn run_items(
        &self,
        items: Vec<GenerationRequest>,
        limit: usize,
    ) -> Vec<GenerationResult> {
        let total = items.len();
        tracing::debug!(total, limit, "Running batch");

        let mut indexed: Vec<(usize, GenerationResult)> =
            futures_util::stream::iter(items.into_iter().enumerate().map(|(index, request)| {
                let dispatcher = Arc::clone(&self.dispatcher);
                async move { (index, dispatcher.generate(&request).await) }
            }))
            .buffer_unordered(limit)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}
