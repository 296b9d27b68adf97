use serde::{Deserialize, Serialize};

/// Who said a turn.
///
/// The serialized names are the ones the endpoint and the persisted
/// transcript use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The person being assessed.
    #[serde(rename = "user")]
    Learner,
    /// The AI tutor.
    #[serde(rename = "ai")]
    Tutor,
}

/// One turn of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who said it.
    pub role: Role,
    /// What was said. May be empty for a tutor reply that hasn't arrived.
    pub content: String,
}

impl ChatTurn {
    /// Creates a learner turn.
    #[inline]
    pub fn learner<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Learner,
            content: content.into(),
        }
    }

    /// Creates a tutor turn.
    #[inline]
    pub fn tutor<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Tutor,
            content: content.into(),
        }
    }
}

/// Encodes turns as the JSON array carried by the `prompt` field.
#[inline]
pub fn encode_transcript(turns: &[ChatTurn]) -> serde_json::Result<String> {
    serde_json::to_string(turns)
}

/// Decodes a JSON array of turns.
#[inline]
pub fn decode_transcript(json: &str) -> serde_json::Result<Vec<ChatTurn>> {
    serde_json::from_str(json)
}
