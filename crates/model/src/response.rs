use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::ProviderError;

/// Why the model stopped writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The model ended its turn.
    EndTurn,
    /// The reply hit the token budget and is cut short.
    MaxTokens,
}

/// What a reply produces while it is being generated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    /// The next piece of text.
    Text(String),
    /// The model stopped. No text follows.
    Stopped(StopReason),
}

/// A reply in the making.
pub trait ModelResponse: Send + 'static {
    /// Polls for the next event.
    ///
    /// Resolves to `Ok(None)` once the reply is over, and keeps doing so
    /// if polled again. An error ends the reply as well.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelEvent>, ProviderError>>;
}

/// Awaitable access to [`ModelResponse`] events.
pub trait ModelResponseExt: ModelResponse {
    /// Waits for the next event, see [`ModelResponse::poll_next_event`].
    #[inline]
    fn next_event(self: Pin<&mut Self>) -> NextEvent<'_, Self> {
        NextEvent { resp: self }
    }
}

impl<R: ModelResponse + ?Sized> ModelResponseExt for R {}

/// Future for [`ModelResponseExt::next_event`].
#[must_use = "futures do nothing unless polled"]
pub struct NextEvent<'a, R: ?Sized> {
    resp: Pin<&'a mut R>,
}

impl<R: ModelResponse + ?Sized> Future for NextEvent<'_, R> {
    type Output = Result<Option<ModelEvent>, ProviderError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        self.resp.as_mut().poll_next_event(cx)
    }
}
