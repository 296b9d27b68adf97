use std::pin::{Pin, pin};
use std::sync::Arc;

use tracing::Instrument;
use tutor_model::{
    ModelEvent, ModelProvider, ModelRequest, ModelResponseExt, ProviderError,
    StopReason,
};

type ReplyResult = Result<Option<StopReason>, ProviderError>;
type BoxedReplyFuture = Pin<Box<dyn Future<Output = ReplyResult> + Send>>;
type DeltaFn = Box<dyn Fn(String) + Send + 'static>;
type GenerateFn =
    Arc<dyn Fn(ModelRequest, DeltaFn) -> BoxedReplyFuture + Send + Sync>;

/// A type-erased handle to a model provider, shared by all requests the
/// endpoint serves.
#[derive(Clone)]
pub struct ModelClient {
    generate_fn: GenerateFn,
}

impl ModelClient {
    /// Wraps `provider`.
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // Erase `P`, so the router state doesn't need a type parameter.
        let generate_fn: GenerateFn = Arc::new(move |req, on_delta| {
            let started = provider.send_request(&req);
            let messages = req.messages.len();
            Box::pin(
                async move { collect_reply(started.await?, on_delta).await }
                    .instrument(debug_span!("model request", messages)),
            )
        });
        Self { generate_fn }
    }

    /// Generates a reply, calling `on_delta` with every piece of text as it
    /// arrives. Resolves to why the model stopped, if it said so.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The model stops being polled once the
    /// returned future is dropped.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: impl Fn(String) + Send + 'static,
    ) -> ReplyResult {
        (self.generate_fn)(req, Box::new(on_delta)).await
    }
}

async fn collect_reply<R: ModelResponseExt>(
    resp: R,
    on_delta: DeltaFn,
) -> ReplyResult {
    let mut resp = pin!(resp);
    let mut chars = 0;
    let mut stop_reason = None;
    while let Some(event) = resp.as_mut().next_event().await? {
        trace!("got an event: {event:?}");
        match event {
            ModelEvent::Text(delta) => {
                chars += delta.chars().count();
                on_delta(delta);
            }
            ModelEvent::Stopped(reason) => stop_reason = Some(reason),
        }
    }
    debug!("reply finished with {chars} chars ({stop_reason:?})");
    Ok(stop_reason)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tutor_model::{ErrorKind, ModelMessage};
    use tutor_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest::with_messages([ModelMessage::User("Hi".to_owned())])
    }

    #[tokio::test]
    async fn test_reusable_client() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_response(PresetResponse::with_deltas(["How ", "are ", "you?"]));
        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let deltas = Arc::new(Mutex::new(vec![]));
            let stop_reason = model_client
                .send_request(request(), {
                    let deltas = Arc::clone(&deltas);
                    move |delta| deltas.lock().unwrap().push(delta)
                })
                .await
                .unwrap();
            assert_eq!(stop_reason, Some(StopReason::EndTurn));
            assert_eq!(deltas.lock().unwrap().concat(), "How are you?");
            assert_eq!(*deltas.lock().unwrap(), ["How ", "are ", "you?"]);
        }
    }

    #[tokio::test]
    async fn test_provider_errors() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let err = model_client
            .send_request(request(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::Text("AGI is".to_owned()),
            PresetEvent::Failure("Overloaded".to_owned()),
        ]));
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(request(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Overloaded");
        assert!(err.kind().is_transient());
    }
}
