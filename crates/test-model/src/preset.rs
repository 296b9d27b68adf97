use serde::{Deserialize, Serialize};

/// A step of a scripted reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PresetEvent {
    /// The model writes this piece of text.
    Text(String),
    /// The reply breaks off with the given message. Later steps are never
    /// reached.
    Failure(String),
}

/// The scripted tutor reply to one learner turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// The steps, in order.
    pub events: Vec<PresetEvent>,
    /// Whether every request for this turn is refused up front.
    #[serde(default)]
    pub refused: bool,
    /// Whether the reply reports that it ran out of tokens.
    #[serde(default)]
    pub truncated: bool,
}

impl PresetResponse {
    /// Creates a reply made of the given steps.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            refused: false,
            truncated: false,
        }
    }

    /// Creates a reply that writes the text in the given pieces.
    pub fn with_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events: Vec<_> = deltas
            .into_iter()
            .map(|delta| PresetEvent::Text(delta.into()))
            .collect();
        Self::with_events(events)
    }

    /// Refuses every request for this turn.
    #[inline]
    pub fn refused(mut self) -> Self {
        self.refused = true;
        self
    }

    /// Marks the reply as cut off by the token budget.
    #[inline]
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }
}
