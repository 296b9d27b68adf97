//! A tutoring session that folds streamed tutor replies into a persisted
//! transcript.
//!
//! The crate includes a CLI tool for taking the assessment in the terminal.
//! It can also be used as a library to drive the conversation from other
//! front ends.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod display;
mod endpoint;
mod session;

pub use display::{ReplyOutput, ReplyPrinter};
pub use endpoint::{EndpointError, HttpEndpoint, ReplyStream, TutorEndpoint};
pub use session::{Session, SessionBuilder, Snapshot};

/// Re-exports of [`tutor_core`] crate.
pub mod core {
    pub use tutor_core::*;
}
