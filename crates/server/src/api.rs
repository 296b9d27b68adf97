//! The HTTP surface of the tutor endpoint.

#[cfg(test)]
mod tests;

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::select;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use tutor_model::{ModelMessage, ModelProvider, ModelRequest, StopReason};
use tutor_protocol::{ChatTurn, FinishReason, Role, StreamPart, TutorRequest};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::model_client::ModelClient;

const DATA_STREAM_HEADER: HeaderName =
    HeaderName::from_static("x-vercel-ai-data-stream");

/// Shared state of all request handlers.
#[derive(Clone)]
pub struct AppState {
    client: ModelClient,
    system_prompt: Arc<str>,
    max_tokens: u32,
    message_ids: Arc<AtomicU64>,
}

impl AppState {
    /// Creates the state serving replies from `provider`.
    pub fn new<P: ModelProvider + 'static>(
        provider: P,
        config: &ServerConfig,
    ) -> Self {
        Self {
            client: ModelClient::new(provider),
            system_prompt: config.system_prompt().into(),
            max_tokens: config.max_tokens(),
            message_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Prepends the system prompt and translates the roles. Tutor turns
    /// without content are dropped, since providers reject empty
    /// assistant messages.
    fn model_request(&self, transcript: Vec<ChatTurn>) -> ModelRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ModelMessage::System(self.system_prompt.to_string()));
        messages.extend(transcript.into_iter().filter_map(|turn| {
            match turn.role {
                Role::Learner => Some(ModelMessage::User(turn.content)),
                Role::Tutor if turn.content.trim().is_empty() => None,
                Role::Tutor => Some(ModelMessage::Assistant(turn.content)),
            }
        }));
        ModelRequest::with_messages(messages).with_max_tokens(self.max_tokens)
    }

    fn next_message_id(&self) -> String {
        let id = self.message_ids.fetch_add(1, Ordering::Relaxed);
        format!("msg-{id:08x}")
    }
}

/// Creates the router of the tutor endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/tutor", post(tutor_reply))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn tutor_reply(
    State(state): State<AppState>,
    payload: Result<Json<TutorRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let transcript = body.transcript()?;
    let turns = transcript.len();
    let req = state.model_request(transcript);

    let message_id = state.next_message_id();
    info!("replying to {turns} turns as {message_id}");

    let (part_tx, part_rx) = mpsc::unbounded_channel();
    part_tx
        .send(StreamPart::StartStep {
            message_id: message_id.clone(),
        })
        .ok();
    tokio::spawn(
        stream_reply(state.client.clone(), req, part_tx)
            .instrument(info_span!("tutor reply", %message_id)),
    );

    let parts = UnboundedReceiverStream::new(part_rx)
        .map(|part| Ok::<_, Infallible>(part.encode()));
    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
        (DATA_STREAM_HEADER, "v1"),
    ];
    Ok((headers, Body::from_stream(parts)).into_response())
}

/// Forwards the reply as stream parts until the model is done or the
/// learner has gone away.
async fn stream_reply(
    client: ModelClient,
    req: ModelRequest,
    part_tx: mpsc::UnboundedSender<StreamPart>,
) {
    let on_delta = {
        let part_tx = part_tx.clone();
        move |delta: String| {
            if !delta.is_empty() {
                part_tx.send(StreamPart::Text(delta)).ok();
            }
        }
    };
    let resp_or_err = select! {
        resp_or_err = client.send_request(req, on_delta) => resp_or_err,
        _ = part_tx.closed() => {
            debug!("connection closed, abandoning reply");
            return;
        }
    };

    let finish_reason = match resp_or_err {
        Ok(stop_reason) => match stop_reason {
            Some(StopReason::MaxTokens) => {
                warn!("reply cut off by the token budget");
                FinishReason::Length
            }
            Some(StopReason::EndTurn) | None => FinishReason::Stop,
        },
        Err(err) => {
            if err.kind().is_transient() {
                warn!("model unavailable ({}): {err}", err.kind());
            } else {
                error!("model failed ({}): {err}", err.kind());
            }
            part_tx
                .send(StreamPart::Error(format!(
                    "Error generating tutor reply: {err}"
                )))
                .ok();
            FinishReason::Error
        }
    };
    part_tx.send(StreamPart::Finish { finish_reason }).ok();
}
