//! The persisted chat transcript.

use tutor_protocol::{ChatTurn, decode_transcript, encode_transcript};

use crate::error::Error;
use crate::storage::Storage;

/// The key the transcript is persisted under.
pub const STORAGE_KEY: &str = "ai-tutor";

/// An ordered, index-addressed sequence of turns, mirrored to durable
/// storage after every mutation.
///
/// Each mutation writes a full snapshot before it is committed in memory,
/// so what the storage holds is always what the transcript holds, even
/// when a write fails.
pub struct TranscriptStore {
    turns: Vec<ChatTurn>,
    storage: Box<dyn Storage>,
}

impl TranscriptStore {
    /// Loads the persisted transcript from `storage`.
    ///
    /// Missing, unreadable or malformed data yields an empty transcript.
    pub fn load<S: Storage>(storage: S) -> Self {
        let turns = match storage.get(STORAGE_KEY) {
            Ok(Some(json)) => decode_transcript(&json).unwrap_or_else(|err| {
                warn!("discarding malformed transcript: {err}");
                vec![]
            }),
            Ok(None) => vec![],
            Err(err) => {
                warn!("failed to read transcript: {err}");
                vec![]
            }
        };
        debug!("loaded {} turns", turns.len());
        Self {
            turns,
            storage: Box::new(storage),
        }
    }

    /// Returns all turns in conversation order.
    #[inline]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if the transcript has no turns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends a turn and returns the new length.
    #[inline]
    pub fn append(&mut self, turn: ChatTurn) -> Result<usize, Error> {
        self.extend([turn])
    }

    /// Appends several turns in a single write and returns the new length.
    pub fn extend<I>(&mut self, turns: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = ChatTurn>,
    {
        let mut next = self.turns.clone();
        next.extend(turns);
        self.commit(next)?;
        Ok(self.turns.len())
    }

    /// Overwrites the turn at `index`.
    pub fn replace_at(
        &mut self,
        index: usize,
        turn: ChatTurn,
    ) -> Result<(), Error> {
        if index >= self.turns.len() {
            return Err(Error::out_of_range(index, self.turns.len()));
        }
        if self.turns[index] == turn {
            return Ok(());
        }
        let mut next = self.turns.clone();
        next[index] = turn;
        self.commit(next)
    }

    /// Empties the transcript and erases the persisted copy.
    pub fn clear(&mut self) {
        self.turns.clear();
        if let Err(err) = self.storage.remove(STORAGE_KEY) {
            warn!("failed to erase transcript: {err}");
        }
    }

    fn commit(&mut self, next: Vec<ChatTurn>) -> Result<(), Error> {
        let json = encode_transcript(&next).map_err(Error::serialize)?;
        self.storage
            .set(STORAGE_KEY, &json)
            .map_err(Error::storage)?;
        trace!("persisted {} turns", next.len());
        self.turns = next;
        Ok(())
    }
}
