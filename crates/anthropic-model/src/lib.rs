//! A model provider backed by the Anthropic Messages API.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use tutor_model::{ErrorKind, ModelProvider, ModelRequest, ProviderError};

pub use config::{AnthropicConfig, AnthropicConfigBuilder};
use io::Sse;
use proto::{ApiError, ErrorResponse};
pub use response::AnthropicResponse;

/// Streams tutor replies from a Claude model.
#[derive(Clone, Debug)]
pub struct AnthropicProvider {
    client: Client,
    config: Arc<AnthropicConfig>,
}

impl AnthropicProvider {
    /// Creates a provider with the given configuration.
    #[inline]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn messages_request(&self, req: &ModelRequest) -> RequestBuilder {
        let body = proto::create_request(req, &self.config);
        self.client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body)
    }
}

impl ModelProvider for AnthropicProvider {
    type Response = AnthropicResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, ProviderError>> + Send + 'static
    {
        let sent = self.messages_request(req).send();
        async move {
            let resp = sent.await.map_err(|err| {
                let message = format!("failed to reach Anthropic: {err}");
                ProviderError::other(message)
            })?;
            if !resp.status().is_success() {
                return Err(error_from_status(resp).await);
            }
            if !is_event_stream(&resp) {
                return Err(ProviderError::other(format!(
                    "unexpected content type: {:?}",
                    resp.headers().get(header::CONTENT_TYPE)
                )));
            }
            Ok(AnthropicResponse::from_sse(Sse::new(
                io::body_from_response(resp),
            )))
        }
    }
}

fn is_event_stream(resp: &Response) -> bool {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .is_some_and(|mime| {
            mime.type_() == mime::TEXT
                && mime.subtype().as_str() == "event-stream"
        })
}

impl From<ApiError> for ProviderError {
    fn from(error: ApiError) -> Self {
        let kind = match error.r#type.as_str() {
            "rate_limit_error" => ErrorKind::RateLimited,
            "overloaded_error" => ErrorKind::Overloaded,
            "invalid_request_error"
            | "authentication_error"
            | "permission_error"
            | "not_found_error"
            | "request_too_large" => ErrorKind::Rejected,
            _ => ErrorKind::Other,
        };
        ProviderError::new(kind, error.message)
    }
}

async fn error_from_status(resp: Response) -> ProviderError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if let Ok(ErrorResponse { error }) = serde_json::from_str(&body) {
        return error.into();
    }
    debug!("unrecognized error body: {body}");
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
        StatusCode::SERVICE_UNAVAILABLE => ErrorKind::Overloaded,
        _ if status.is_client_error() => ErrorKind::Rejected,
        _ => ErrorKind::Other,
    };
    ProviderError::new(kind, format!("HTTP status {status}"))
}
