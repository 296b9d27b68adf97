/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The input messages, in conversation order.
    pub messages: Vec<ModelMessage>,
    /// The maximum number of tokens the model may generate.
    ///
    /// `None` lets the provider pick its own default.
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    /// Creates a request with the given messages and no token budget.
    #[inline]
    pub fn with_messages(messages: impl Into<Vec<ModelMessage>>) -> Self {
        Self {
            messages: messages.into(),
            max_tokens: None,
        }
    }

    /// Caps the length of the generated response.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Returns the system instructions, if the request carries any.
    ///
    /// Providers that take the system prompt out-of-band (instead of as a
    /// message) should use this together with [`ModelMessage::is_system`].
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter_map(|msg| match msg {
                ModelMessage::System(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Returns `true` if this is a system message.
    #[inline]
    pub fn is_system(&self) -> bool {
        matches!(self, ModelMessage::System(_))
    }

    /// Returns the text of this message.
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            ModelMessage::System(text)
            | ModelMessage::User(text)
            | ModelMessage::Assistant(text) => text,
        }
    }
}
