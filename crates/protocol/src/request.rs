use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::turn::{ChatTurn, decode_transcript, encode_transcript};

/// The minimum length of a prompt, in characters.
pub const MIN_PROMPT_CHARS: usize = 2;
/// The maximum length of a prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 20_000;

/// The body of a request to the tutor endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TutorRequest {
    /// The JSON-encoded transcript, see [`encode_transcript`].
    pub prompt: String,
}

impl TutorRequest {
    /// Creates a request carrying the given turns.
    #[inline]
    pub fn from_turns(turns: &[ChatTurn]) -> serde_json::Result<Self> {
        Ok(Self {
            prompt: encode_transcript(turns)?,
        })
    }

    /// Validates the prompt and decodes the transcript it carries.
    pub fn transcript(&self) -> Result<Vec<ChatTurn>, ValidationError> {
        let len = self.prompt.chars().count();
        if len < MIN_PROMPT_CHARS {
            return Err(ValidationError::PromptTooShort(len));
        }
        if len > MAX_PROMPT_CHARS {
            return Err(ValidationError::PromptTooLong(len));
        }
        decode_transcript(&self.prompt)
            .map_err(|err| ValidationError::MalformedTranscript(err.to_string()))
    }
}
