use std::collections::VecDeque;
use std::mem;

use futures_util::StreamExt;
use futures_util::stream;
use reqwest::{Client, Response};
use serde::Deserialize;
use tutor_protocol::{StreamDecoder, StreamPart, TutorRequest};

use super::{EndpointError, ReplyStream, TutorEndpoint};

/// A tutor endpoint served over HTTP, see `tutor-server`.
#[derive(Clone, Debug)]
pub struct HttpEndpoint {
    client: Client,
    url: String,
}

impl HttpEndpoint {
    /// Creates an endpoint client for the server at `base_url`, e.g.
    /// `http://127.0.0.1:8787`.
    pub fn new<S: AsRef<str>>(base_url: S) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/');
        Self {
            client: Client::new(),
            url: format!("{base_url}/api/tutor"),
        }
    }

    /// Returns the URL requests are posted to.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl TutorEndpoint for HttpEndpoint {
    fn send(
        &self,
        request: TutorRequest,
    ) -> impl Future<Output = Result<ReplyStream, EndpointError>> + Send + 'static
    {
        let req = self.client.post(&self.url).json(&request);
        async move {
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let message = match resp.json::<ErrorBody>().await {
                    Ok(body) => body.error,
                    Err(_) => status.to_string(),
                };
                return Err(EndpointError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
            debug!("reply started with {status}");
            Ok(reply_stream(resp))
        }
    }
}

struct ReplyState {
    resp: Response,
    decoder: StreamDecoder,
    parts: VecDeque<StreamPart>,
    eof: bool,
    done: bool,
}

fn reply_stream(resp: Response) -> ReplyStream {
    let state = ReplyState {
        resp,
        decoder: StreamDecoder::new(),
        parts: VecDeque::new(),
        eof: false,
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }
            if let Some(part) = state.parts.pop_front() {
                match part {
                    StreamPart::Text(text) => return Some((Ok(text), state)),
                    StreamPart::Error(message) => {
                        state.done = true;
                        let err = EndpointError::Reply(message);
                        return Some((Err(err), state));
                    }
                    StreamPart::Finish { finish_reason } => {
                        trace!("reply finished: {finish_reason:?}");
                        state.done = true;
                    }
                    StreamPart::StartStep { message_id } => {
                        trace!("reply {message_id} started");
                    }
                }
                continue;
            }
            if state.eof {
                return None;
            }

            let decoded = match state.resp.chunk().await {
                Ok(Some(chunk)) => state.decoder.push(&chunk),
                Ok(None) => {
                    state.eof = true;
                    mem::take(&mut state.decoder)
                        .finish()
                        .map(|part| part.into_iter().collect())
                }
                Err(err) => {
                    state.done = true;
                    return Some((Err(err.into()), state));
                }
            };
            match decoded {
                Ok(parts) => state.parts.extend(parts),
                Err(err) => {
                    state.done = true;
                    return Some((Err(err.into()), state));
                }
            }
        }
    })
    .boxed()
}
