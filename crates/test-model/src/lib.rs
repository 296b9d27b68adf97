//! A scripted model for exercising the tutor endpoint without a network.

mod preset;

use std::collections::VecDeque;
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use tutor_model::{
    ErrorKind, ModelEvent, ModelMessage, ModelProvider, ModelRequest,
    ModelResponse, ProviderError, StopReason,
};

pub use preset::{PresetEvent, PresetResponse};

const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// A reply played back from a [`PresetResponse`], one step per `delay`.
pub struct TestModelResponse {
    pending: VecDeque<Result<ModelEvent, ProviderError>>,
    delay: Duration,
    timer: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn play(preset: &PresetResponse, delay: Duration) -> Self {
        let mut pending = VecDeque::with_capacity(preset.events.len() + 1);
        for event in &preset.events {
            match event {
                PresetEvent::Text(text) => {
                    pending.push_back(Ok(ModelEvent::Text(text.clone())));
                }
                PresetEvent::Failure(message) => {
                    pending.push_back(Err(ProviderError::new(
                        ErrorKind::Overloaded,
                        message.clone(),
                    )));
                    break;
                }
            }
        }
        if !matches!(pending.back(), Some(Err(_))) {
            let reason = if preset.truncated {
                StopReason::MaxTokens
            } else {
                StopReason::EndTurn
            };
            pending.push_back(Ok(ModelEvent::Stopped(reason)));
        }
        Self {
            pending,
            delay,
            timer: None,
        }
    }
}

impl ModelResponse for TestModelResponse {
    fn poll_next_event(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelEvent>, ProviderError>> {
        let this = &mut *self;
        if this.pending.is_empty() {
            return Poll::Ready(Ok(None));
        }
        let delay = this.delay;
        let timer = this.timer.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.timer = None;

        match this.pending.pop_front() {
            Some(Ok(event)) => Poll::Ready(Ok(Some(event))),
            Some(Err(err)) => {
                this.pending.clear();
                Poll::Ready(Err(err))
            }
            None => Poll::Ready(Ok(None)),
        }
    }
}

#[derive(Default)]
struct Journal {
    requests: Vec<ModelRequest>,
}

/// A model that follows a script.
///
/// The script holds one [`PresetResponse`] per learner turn: a request
/// carrying `n` user messages is answered with the `n`-th response. A
/// request beyond the end of the script fails.
///
/// Clones share the script position and the log of received requests.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    journal: Arc<Mutex<Journal>>,
}

impl TestModelProvider {
    /// Appends the reply to the next learner turn.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Sets the pause before each step of a reply.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request this provider (or any of its clones) received.
    pub fn received_requests(&self) -> Vec<ModelRequest> {
        self.journal
            .lock()
            .map(|journal| journal.requests.clone())
            .unwrap_or_default()
    }

    fn respond(
        &self,
        req: &ModelRequest,
    ) -> Result<TestModelResponse, ProviderError> {
        let mut journal = self
            .journal
            .lock()
            .map_err(|_| ProviderError::other("journal poisoned"))?;
        journal.requests.push(req.clone());

        let learner_turns = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::User(_)))
            .count();
        let Some(step) = learner_turns.checked_sub(1) else {
            return Err(ProviderError::new(
                ErrorKind::Rejected,
                "no learner turn",
            ));
        };
        let Some(preset) = self.script.get(step) else {
            return Err(ProviderError::other(format!(
                "no reply scripted for turn {learner_turns}"
            )));
        };

        if preset.refused {
            return Err(ProviderError::new(
                ErrorKind::RateLimited,
                "preset failure",
            ));
        }

        Ok(TestModelResponse::play(
            preset,
            self.delay.unwrap_or(DEFAULT_DELAY),
        ))
    }
}

impl ModelProvider for TestModelProvider {
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, ProviderError>> + Send + 'static
    {
        ready(self.respond(req))
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;

    use tutor_model::ModelResponseExt;

    use super::*;

    async fn collect(
        resp: TestModelResponse,
    ) -> Result<(String, Option<StopReason>), ProviderError> {
        let mut resp = pin!(resp);
        let mut text = String::new();
        let mut stop_reason = None;
        while let Some(event) = resp.as_mut().next_event().await? {
            match event {
                ModelEvent::Text(delta) => text.push_str(&delta),
                ModelEvent::Stopped(reason) => stop_reason = Some(reason),
            }
        }
        Ok((text, stop_reason))
    }

    fn learner(text: &str) -> ModelMessage {
        ModelMessage::User(text.to_owned())
    }

    #[tokio::test]
    async fn test_follows_script() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_deltas([
            "What do you ",
            "think AGI is?",
        ]));
        provider.add_response(
            PresetResponse::with_deltas(["Great job! ", "__COMPLETE__"])
                .truncated(),
        );

        let mut req = ModelRequest::with_messages([
            ModelMessage::System("Assess the learner.".to_owned()),
            learner("Hi"),
        ]);
        let resp = provider.send_request(&req).await.unwrap();
        let (text, stop_reason) = collect(resp).await.unwrap();
        assert_eq!(text, "What do you think AGI is?");
        assert_eq!(stop_reason, Some(StopReason::EndTurn));

        req.messages.push(ModelMessage::Assistant(text));
        req.messages.push(learner("Systems that outperform humans"));
        let resp = provider.send_request(&req).await.unwrap();
        let (text, stop_reason) = collect(resp).await.unwrap();
        assert_eq!(text, "Great job! __COMPLETE__");
        assert_eq!(stop_reason, Some(StopReason::MaxTokens));

        assert_eq!(provider.clone().received_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_refused_turn() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_deltas(["Hi"]).refused());

        let req = ModelRequest::with_messages([learner("Hi")]);
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimited);
        }
        assert_eq!(provider.received_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_midway() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::Text("AGI is".to_owned()),
            PresetEvent::Failure("Overloaded".to_owned()),
            PresetEvent::Text("never sent".to_owned()),
        ]));

        let req = ModelRequest::with_messages([learner("Hi")]);
        let resp = provider.send_request(&req).await.unwrap();
        let mut resp = pin!(resp);
        assert_eq!(
            resp.as_mut().next_event().await,
            Ok(Some(ModelEvent::Text("AGI is".to_owned())))
        );
        let err = resp.as_mut().next_event().await.unwrap_err();
        assert_eq!(err.message(), "Overloaded");
        assert_eq!(resp.as_mut().next_event().await, Ok(None));
    }

    #[tokio::test]
    async fn test_off_script() {
        let provider = TestModelProvider::default();
        let err = provider
            .send_request(&ModelRequest::with_messages([learner("Hi")]))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "no reply scripted for turn 1");

        let err = provider
            .send_request(&ModelRequest::with_messages(Vec::new()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }
}
