//! Client-side conversation state: the persisted transcript and the
//! reconciler folding streamed tutor replies into it.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod reconciler;
mod storage;
mod transcript;

pub use error::{Error, ErrorKind};
pub use reconciler::{PendingRequest, Reconciler, StreamCursor, UiMode};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use transcript::{STORAGE_KEY, TranscriptStore};
pub use tutor_protocol::{ChatTurn, Role};
