//! The contract between the tutor client and the tutor endpoint.
//!
//! Both sides of the conversation agree on three things, all defined here:
//!
//! - the request body, a single `prompt` field carrying the JSON-encoded
//!   transcript ([`TutorRequest`], [`ChatTurn`]);
//! - the framing of the streamed reply ([`StreamPart`], [`StreamDecoder`]);
//! - the in-band completion marker the model appends once the learner has
//!   mastered the topic ([`COMPLETION_SENTINEL`]).

#![deny(missing_docs)]

mod error;
mod request;
mod sentinel;
mod stream;
mod turn;

pub use error::{DecodeError, ValidationError};
pub use request::{MAX_PROMPT_CHARS, MIN_PROMPT_CHARS, TutorRequest};
pub use sentinel::{COMPLETION_SENTINEL, strip_completion_sentinel};
pub use stream::{FinishReason, StreamDecoder, StreamPart};
pub use turn::{ChatTurn, Role, decode_transcript, encode_transcript};
