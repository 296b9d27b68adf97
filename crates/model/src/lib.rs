//! The contract between the tutor endpoint and the language model that
//! writes the tutor's replies.
//!
//! The endpoint only ever needs two things from a model: start generating
//! a reply to a conversation, then hand the reply over piece by piece.
//! [`ModelProvider`] and [`ModelResponse`] describe exactly that, so the
//! hosted model can be swapped for a scripted one in tests.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::{ErrorKind, ProviderError};
pub use provider::ModelProvider;
pub use request::{ModelMessage, ModelRequest};
pub use response::{
    ModelEvent, ModelResponse, ModelResponseExt, NextEvent, StopReason,
};
