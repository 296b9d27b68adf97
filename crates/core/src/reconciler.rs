//! Folds a streamed tutor reply into the transcript.

#[cfg(test)]
mod proptests;

use tutor_protocol::{ChatTurn, TutorRequest, strip_completion_sentinel};

use crate::error::Error;
use crate::transcript::TranscriptStore;

/// What the learner sees below the transcript.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UiMode {
    /// The learner can type answers.
    #[default]
    Conversing,
    /// The tutor has signalled that the exercise is complete.
    Finished,
}

/// Marks the transcript slot receiving a streamed reply.
///
/// Every event of a stream carries the cursor handed out when the stream
/// was requested. The generation tells streams apart, so events of a stream
/// started before a reset never match the active cursor again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamCursor {
    generation: u64,
    index: usize,
}

impl StreamCursor {
    /// Returns the generation of the request this cursor belongs to.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the transcript position of the placeholder turn.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A request the caller should send to the tutor endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    /// The cursor to tag every event of the reply with.
    pub cursor: StreamCursor,
    /// The request body, carrying every turn before the placeholder.
    pub request: TutorRequest,
}

/// The client-side conversation state machine.
///
/// It owns the transcript and drives at most one reply at a time. All
/// methods are meant to be called from a single logical thread, in the
/// order the corresponding events happen.
pub struct Reconciler {
    store: TranscriptStore,
    cursor: Option<StreamCursor>,
    mode: UiMode,
    generation: u64,
    last_error: Option<String>,
}

impl Reconciler {
    /// Creates a reconciler over a loaded transcript.
    #[inline]
    pub fn new(store: TranscriptStore) -> Self {
        Self {
            store,
            cursor: None,
            mode: UiMode::Conversing,
            generation: 0,
            last_error: None,
        }
    }

    /// Returns the transcript.
    #[inline]
    pub fn transcript(&self) -> &[ChatTurn] {
        self.store.turns()
    }

    /// Returns the current UI mode.
    #[inline]
    pub fn mode(&self) -> UiMode {
        self.mode
    }

    /// Returns the active stream cursor, if a reply is in flight.
    #[inline]
    pub fn cursor(&self) -> Option<StreamCursor> {
        self.cursor
    }

    /// Returns `true` if a reply is in flight.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.cursor.is_some()
    }

    /// Returns the error of the last failed reply, for display.
    #[inline]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Submits a learner turn.
    ///
    /// Returns `Ok(None)` without touching anything if the trimmed text is
    /// empty or a reply is already in flight. Otherwise the learner turn
    /// and an empty tutor placeholder are appended, and the request to send
    /// is returned.
    pub fn submit(
        &mut self,
        text: &str,
    ) -> Result<Option<PendingRequest>, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if let Some(cursor) = self.cursor {
            debug!("reply {} in flight, input rejected", cursor.generation);
            return Ok(None);
        }

        let learner = ChatTurn::learner(text);
        let mut prompt_turns = self.store.turns().to_vec();
        prompt_turns.push(learner.clone());
        let request = TutorRequest::from_turns(&prompt_turns)
            .map_err(Error::serialize)?;
        let len = self.store.extend([learner, ChatTurn::tutor("")])?;

        self.generation += 1;
        let cursor = StreamCursor {
            generation: self.generation,
            index: len - 1,
        };
        self.cursor = Some(cursor);
        self.last_error = None;
        debug!("reply {} will land at {}", cursor.generation, cursor.index);

        Ok(Some(PendingRequest { cursor, request }))
    }

    /// Handles the first byte of a reply.
    ///
    /// Forces the conversing mode, so a finished state left over from an
    /// earlier exchange doesn't survive. Returns `false` for stale cursors.
    pub fn response_started(&mut self, cursor: StreamCursor) -> bool {
        if !self.is_active(cursor) {
            return false;
        }
        self.mode = UiMode::Conversing;
        true
    }

    /// Applies the cumulative text of a reply received so far.
    ///
    /// The completion marker is stripped from the stored text and switches
    /// the mode to finished. Applying the same text twice has no further
    /// effect. Returns `Ok(false)` for stale cursors.
    pub fn apply_chunk(
        &mut self,
        cursor: StreamCursor,
        cumulative: &str,
    ) -> Result<bool, Error> {
        if !self.is_active(cursor) {
            trace!("dropping chunk of stale reply {}", cursor.generation);
            return Ok(false);
        }

        let (text, complete) = strip_completion_sentinel(cumulative);
        self.store.replace_at(cursor.index, ChatTurn::tutor(text))?;
        if complete && self.mode != UiMode::Finished {
            info!("exercise complete");
            self.mode = UiMode::Finished;
        }
        Ok(true)
    }

    /// Ends a reply, successfully or with an error message for display.
    ///
    /// Whatever text has been applied stays in place. Returns `false` for
    /// stale cursors.
    pub fn finish(
        &mut self,
        cursor: StreamCursor,
        outcome: Result<(), String>,
    ) -> bool {
        if !self.is_active(cursor) {
            return false;
        }
        self.cursor = None;
        if let Err(message) = outcome {
            warn!("reply {} failed: {message}", cursor.generation);
            self.last_error = Some(message);
        }
        true
    }

    /// Starts over with an empty transcript.
    ///
    /// A reply in flight is disregarded from now on: its cursor no longer
    /// matches, so its remaining events are dropped.
    pub fn reset(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            debug!("disregarding reply {}", cursor.generation);
        }
        self.store.clear();
        self.mode = UiMode::Conversing;
        self.last_error = None;
    }

    #[inline]
    fn is_active(&self, cursor: StreamCursor) -> bool {
        self.cursor == Some(cursor)
    }
}
