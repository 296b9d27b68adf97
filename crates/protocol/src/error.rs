use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Describes why a tutor request was rejected before any reply was
/// streamed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// The prompt has fewer characters than allowed.
    PromptTooShort(usize),
    /// The prompt has more characters than allowed.
    PromptTooLong(usize),
    /// The prompt is not a JSON-encoded transcript.
    MalformedTranscript(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::PromptTooShort(len) => write!(
                f,
                "`prompt` must contain at least {} characters, got {len}",
                crate::MIN_PROMPT_CHARS
            ),
            ValidationError::PromptTooLong(len) => write!(
                f,
                "`prompt` must contain at most {} characters, got {len}",
                crate::MAX_PROMPT_CHARS
            ),
            ValidationError::MalformedTranscript(reason) => write!(
                f,
                "`prompt` must be valid JSON produced by the client: {reason}"
            ),
        }
    }
}

impl Error for ValidationError {}

/// An error that occurred while decoding a streamed reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// A line is not valid UTF-8.
    InvalidUtf8,
    /// A line doesn't follow the `<code>:<json>` shape.
    MalformedLine(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidUtf8 => write!(f, "reply is not valid UTF-8"),
            DecodeError::MalformedLine(line) => {
                write!(f, "malformed stream line: {line:?}")
            }
        }
    }
}

impl Error for DecodeError {}
