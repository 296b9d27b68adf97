//! Clients of the tutor endpoint.

mod http;

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use futures_util::stream::BoxStream;
use tutor_protocol::{DecodeError, TutorRequest};

pub use http::HttpEndpoint;

/// The text of a reply, piece by piece.
///
/// Every item is either the next piece of text, or a terminal error after
/// which the stream ends.
pub type ReplyStream = BoxStream<'static, Result<String, EndpointError>>;

/// A tutor endpoint, which answers a transcript with a streamed reply.
pub trait TutorEndpoint: Send + Sync + 'static {
    /// Sends a request. The returned future resolves once the reply has
    /// started, i.e. when its first bytes arrived.
    fn send(
        &self,
        request: TutorRequest,
    ) -> impl Future<Output = Result<ReplyStream, EndpointError>> + Send + 'static;
}

/// An error that occurred while talking to the tutor endpoint.
#[derive(Debug)]
pub enum EndpointError {
    /// The endpoint couldn't be reached, or the connection broke.
    Transport(reqwest::Error),
    /// The endpoint refused the request.
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The reason the endpoint gave.
        message: String,
    },
    /// The reply failed; the message comes from the endpoint and is meant
    /// for display.
    Reply(String),
    /// The reply couldn't be decoded.
    Decode(DecodeError),
}

impl Display for EndpointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::Transport(err) => {
                write!(f, "failed to reach the tutor: {err}")
            }
            EndpointError::Rejected { status, message } => {
                write!(f, "the tutor rejected the request ({status}): {message}")
            }
            EndpointError::Reply(message) => f.write_str(message),
            EndpointError::Decode(err) => write!(f, "broken reply: {err}"),
        }
    }
}

impl Error for EndpointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EndpointError::Transport(err) => Some(err),
            EndpointError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for EndpointError {
    #[inline]
    fn from(err: reqwest::Error) -> Self {
        EndpointError::Transport(err)
    }
}

impl From<DecodeError> for EndpointError {
    #[inline]
    fn from(err: DecodeError) -> Self {
        EndpointError::Decode(err)
    }
}
