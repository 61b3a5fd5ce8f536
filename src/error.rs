//! Engine error types.
//!
//! Errors that halt a flow are typed here; recoverable policy outcomes
//! (empty generator results, merges that append nothing) are logged by the
//! code that observes them and do not surface as errors.

use thiserror::Error;

/// Errors produced by the engine and its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A request to the generator or model registry failed or timed out.
    /// The message is user-visible; callers surface it rather than retrying
    /// silently.
    #[error("generator request failed: {0}")]
    Network(String),

    /// The generator returned data that cannot be decoded as a timeline.
    /// Carries the raw diagnostic text when the service provided one.
    #[error("could not decode generated data: {0}")]
    Parse(String),

    /// The model registry response could not be interpreted.
    #[error("model registry error: {0}")]
    Registry(String),

    /// An operation was invoked from the wrong session state.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// The audio backend failed to initialize or render.
    #[error("audio backend error: {0}")]
    Audio(#[from] anyhow::Error),

    /// Filesystem failure while persisting or loading a timeline.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
