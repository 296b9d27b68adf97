//! The tutor endpoint: forwards a learner's conversation to the model and
//! streams the reply back using the data-stream framing.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod api;
mod config;
mod error;
mod model_client;

pub use api::{AppState, router};
pub use config::{ConfigError, DEFAULT_SYSTEM_PROMPT, ServerConfig};
pub use error::ApiError;
