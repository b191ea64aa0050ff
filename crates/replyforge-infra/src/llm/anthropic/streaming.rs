//! SSE stream handling for the Anthropic Messages API.
//!
//! Event sequence per the Anthropic streaming protocol:
//! 1. `message_start` -- message object with initial usage
//! 2. Per block: `content_block_start` -> N x `content_block_delta` ->
//!    `content_block_stop`
//! 3. `message_delta` -- stop reason and cumulative usage
//! 4. `message_stop` -- final event
//! 5. `ping` keepalives may appear anywhere
//! 6. `error` events may appear mid-stream
//!
//! Only `text_delta` payloads carry reply text; everything else is either
//! bookkeeping or ignored. `message_stop` maps to the terminal chunk.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use replyforge_types::llm::{ProviderError, TextChunk};

use super::client::{map_status, API_VERSION};
use super::types::{AnthropicRequest, ContentBlockDeltaPayload, ErrorPayload};

/// Map an Anthropic `error` event to a [`ProviderError`].
fn map_stream_error(payload: ErrorPayload) -> ProviderError {
    match payload.error.error_type.as_str() {
        "authentication_error" | "permission_error" => ProviderError::Auth,
        "rate_limit_error" => ProviderError::RateLimited {
            retry_after_ms: None,
        },
        _ => ProviderError::Transport(format!(
            "{}: {}",
            payload.error.error_type, payload.error.message
        )),
    }
}

/// Create a streaming SSE connection to the Anthropic Messages API.
///
/// Returns a finite stream of [`TextChunk`]s: one chunk per `text_delta`,
/// terminated by a `done` chunk on `message_stop`. Protocol violations
/// (the stream ending without `message_stop`) surface as
/// `MalformedResponse`.
pub fn create_anthropic_stream(
    client: &reqwest::Client,
    url: &str,
    body: AnthropicRequest,
    api_key: &SecretString,
) -> Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send + 'static>> {
    let client = client.clone();
    let url = url.to_string();
    let api_key = api_key.clone();

    Box::pin(async_stream::stream! {
        let response = match client
            .post(&url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                yield Err(ProviderError::Transport(format!("HTTP request failed: {e}")));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            yield Err(map_status(status, error_body));
            return;
        }

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(ProviderError::Transport(format!("SSE stream error: {e}")));
                    return;
                }
            };

            match event.event.as_str() {
                "content_block_delta" => {
                    match serde_json::from_str::<ContentBlockDeltaPayload>(&event.data) {
                        Ok(payload) => {
                            if payload.delta.delta_type == "text_delta" {
                                if let Some(text) = payload.delta.text {
                                    if !text.is_empty() {
                                        yield Ok(TextChunk { text, done: false });
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(ProviderError::MalformedResponse(format!(
                                "bad content_block_delta payload: {e}"
                            )));
                            return;
                        }
                    }
                }
                "message_stop" => {
                    yield Ok(TextChunk {
                        text: String::new(),
                        done: true,
                    });
                    return;
                }
                "error" => {
                    match serde_json::from_str::<ErrorPayload>(&event.data) {
                        Ok(payload) => yield Err(map_stream_error(payload)),
                        Err(e) => yield Err(ProviderError::MalformedResponse(format!(
                            "bad error payload: {e}"
                        ))),
                    }
                    return;
                }
                // message_start, content_block_start, content_block_stop,
                // message_delta, ping: bookkeeping only.
                _ => {}
            }
        }

        yield Err(ProviderError::MalformedResponse(
            "stream ended without message_stop".to_string(),
        ));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_stream_error_auth() {
        let payload = ErrorPayload {
            error: super::super::types::AnthropicError {
                error_type: "authentication_error".to_string(),
                message: "bad key".to_string(),
            },
        };
        assert!(matches!(map_stream_error(payload), ProviderError::Auth));
    }

    #[test]
    fn test_map_stream_error_rate_limit() {
        let payload = ErrorPayload {
            error: super::super::types::AnthropicError {
                error_type: "rate_limit_error".to_string(),
                message: "slow down".to_string(),
            },
        };
        assert!(matches!(
            map_stream_error(payload),
            ProviderError::RateLimited { .. }
        ));
    }

    #[test]
    fn test_map_stream_error_overloaded_is_transport() {
        let payload = ErrorPayload {
            error: super::super::types::AnthropicError {
                error_type: "overloaded_error".to_string(),
                message: "busy".to_string(),
            },
        };
        let err = map_stream_error(payload);
        assert!(matches!(err, ProviderError::Transport(_)));
        assert!(err.to_string().contains("overloaded_error"));
    }
}
