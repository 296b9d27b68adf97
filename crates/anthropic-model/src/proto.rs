use serde::{Deserialize, Serialize};
use tutor_model::{ModelMessage, ModelRequest};

use crate::AnthropicConfig;

// ------------------------------
// Types received from the server
// ------------------------------

/// One `data:` payload of the Messages streaming API.
#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: u32,
    },
    ContentBlockDelta {
        index: u32,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDeltaBody,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageStart {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageDeltaBody {
    pub stop_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub r#type: String,
    pub message: String,
}

/// The body of a non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    role: Role,
    content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    stream: bool,
}

// -----------
// Conversions
// -----------

/// Builds a streaming Messages request. System messages are lifted into
/// the top-level `system` field, since the API doesn't accept them inline.
#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &AnthropicConfig,
) -> MessagesRequest {
    MessagesRequest {
        model: config.model.clone(),
        max_tokens: req.max_tokens.unwrap_or(config.max_tokens),
        system: req.system_prompt(),
        messages: req.messages.iter().filter_map(create_message).collect(),
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Option<Message> {
    let role = match msg {
        ModelMessage::System(_) => return None,
        ModelMessage::User(_) => Role::User,
        ModelMessage::Assistant(_) => Role::Assistant,
    };
    Some(Message {
        role,
        content: msg.text().to_owned(),
    })
}
