use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tutor_model::{ModelEvent, ModelResponse, ProviderError, StopReason};

use crate::io::Sse;
use crate::proto::{ContentDelta, StreamEvent};

/// A streaming reply from the Messages API.
pub struct AnthropicResponse {
    events: BoxStream<'static, Result<ModelEvent, ProviderError>>,
}

impl AnthropicResponse {
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let decoder = Decoder {
            sse,
            message_id: None,
            stop_reason: None,
            stopped: false,
        };
        // An error ends the reply, so the decoder is dropped with it.
        let events = stream::unfold(Some(decoder), |decoder| async move {
            let mut decoder = decoder?;
            match decoder.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(decoder))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        });
        Self {
            events: events.fuse().boxed(),
        }
    }
}

impl ModelResponse for AnthropicResponse {
    fn poll_next_event(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelEvent>, ProviderError>> {
        self.events.poll_next_unpin(cx).map(Option::transpose)
    }
}

/// Turns Messages API stream events into reply events.
struct Decoder {
    sse: Sse,
    message_id: Option<String>,
    // Reported by `message_delta`, emitted once the message stops.
    stop_reason: Option<StopReason>,
    stopped: bool,
}

impl Decoder {
    async fn next_event(
        &mut self,
    ) -> Result<Option<ModelEvent>, ProviderError> {
        while !self.stopped {
            let Some(sse_event) = self
                .sse
                .next_event()
                .await
                .map_err(|err| ProviderError::other(err.to_string()))?
            else {
                // Whatever arrived before the connection closed is kept.
                warn!(
                    "stream of {:?} ended before message_stop",
                    self.message_id
                );
                return Ok(Some(self.stop()));
            };
            trace!("got sse event: {sse_event}");

            let event = serde_json::from_str::<StreamEvent>(&sse_event.data)
                .map_err(|err| {
                    ProviderError::other(format!("unexpected event: {err}"))
                })?;
            match event {
                StreamEvent::MessageStart { message } => {
                    debug!("message {} started", message.id);
                    self.message_id = Some(message.id);
                }
                StreamEvent::ContentBlockDelta {
                    delta: ContentDelta::TextDelta { text },
                    ..
                } if !text.is_empty() => {
                    return Ok(Some(ModelEvent::Text(text)));
                }
                StreamEvent::MessageDelta { delta } => {
                    if let Some(reason) = delta.stop_reason {
                        self.stop_reason = Some(parse_stop_reason(&reason));
                    }
                }
                StreamEvent::MessageStop => return Ok(Some(self.stop())),
                StreamEvent::Error { error } => return Err(error.into()),
                _ => {}
            }
        }
        Ok(None)
    }

    fn stop(&mut self) -> ModelEvent {
        self.stopped = true;
        let reason = self.stop_reason.take().unwrap_or(StopReason::EndTurn);
        ModelEvent::Stopped(reason)
    }
}

fn parse_stop_reason(stop_reason: &str) -> StopReason {
    match stop_reason {
        "max_tokens" => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}
