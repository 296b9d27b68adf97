use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Broad categories of provider failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Too many requests were sent with the same credentials.
    RateLimited,
    /// The model is temporarily out of capacity.
    Overloaded,
    /// The provider refused the request itself, e.g. a bad API key or a
    /// conversation it can't accept.
    Rejected,
    /// The connection broke, or the provider sent something unreadable.
    Other,
}

impl ErrorKind {
    /// Returns `true` if sending the same request later may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Overloaded)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Overloaded => "overloaded",
            ErrorKind::Rejected => "request rejected",
            ErrorKind::Other => "provider error",
        })
    }
}

/// A failure reported by a model provider.
///
/// The message is shown to learners as is, so providers should pass on what
/// the model service said rather than internal details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
}

impl ProviderError {
    /// Creates an error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an [`ErrorKind::Other`] error.
    #[inline]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ProviderError {}
