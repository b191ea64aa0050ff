//! OpenAI SSE stream to [`TextChunk`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] chunks to the
//! provider-agnostic text chunk shape: one chunk per content delta, a
//! terminal `done` chunk once a finish reason has been seen and the stream
//! drains (the final usage-only chunk arrives after the finish reason when
//! `stream_options.include_usage` is set).

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use async_openai::types::chat::ChatCompletionResponseStream;

use replyforge_types::llm::{ProviderError, TextChunk};

/// Map an async-openai response stream to a stream of [`TextChunk`]s.
pub fn map_openai_stream(
    stream: ChatCompletionResponseStream,
) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
    Box::pin(async_stream::stream! {
        let mut stream = stream;
        let mut finished = false;

        while let Some(result) = stream.next().await {
            let chunk = match result {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(ProviderError::Transport(format!("stream error: {e}")));
                    return;
                }
            };

            for choice in &chunk.choices {
                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() {
                        yield Ok(TextChunk {
                            text: content.clone(),
                            done: false,
                        });
                    }
                }
                if choice.finish_reason.is_some() {
                    finished = true;
                }
            }
        }

        if finished {
            yield Ok(TextChunk {
                text: String::new(),
                done: true,
            });
        } else {
            yield Err(ProviderError::MalformedResponse(
                "stream ended without finish_reason".to_string(),
            ));
        }
    })
}
