//! Generator collaborator interface.
//!
//! The engine asks an external model service for note segments: either a
//! batch of independent opening candidates, or a continuation conditioned on
//! a context window. The trait keeps the engine testable; the HTTP client
//! in [`http`] is the concrete transport.

pub mod http;
pub mod registry;

pub use http::HttpGenerator;
pub use registry::{ModelInfo, ModelKind, ModelRegistry, ModelRules, ModelTag};

use crate::error::EngineError;
use crate::score::Timeline;
use async_trait::async_trait;

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.95,
            top_p: 0.95,
        }
    }
}

/// Continuation conditioning: how many measures of echoed context the
/// prompt carries and how many new measures are requested.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationWindow {
    pub context_measures: u32,
    pub extension_measures: u32,
}

/// A single generation request.
///
/// `prompt` carries the conditioning notes (empty for context-free opening
/// candidates) and the tempo/key metadata the model needs.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier from the registry.
    pub model: String,

    /// Prompt timeline, re-based to start at time zero.
    pub prompt: Timeline,

    /// Sampling parameters.
    pub sampling: SamplingParams,

    /// Task type understood by the model service.
    pub task: String,

    /// Number of independent results requested.
    pub num_variants: u32,

    /// Key signature hint, e.g. "CM".
    pub key: String,

    /// Instrument hints for the model (program names).
    pub instruments: Vec<String>,

    /// Set for continuation requests; None for free generation.
    pub continuation: Option<ContinuationWindow>,
}

impl GenerateRequest {
    /// Builds a request for `num_variants` independent candidates from the
    /// given prompt (which may be empty for a cold start).
    pub fn variations(model: impl Into<String>, prompt: Timeline, num_variants: u32) -> Self {
        Self {
            model: model.into(),
            prompt,
            sampling: SamplingParams::default(),
            task: "MUSICGEM".to_string(),
            num_variants,
            key: "CM".to_string(),
            instruments: Vec::new(),
            continuation: None,
        }
    }

    /// Builds a continuation request: the prompt is the trailing context of
    /// a composition and the model is asked to extend it.
    pub fn continuation(
        model: impl Into<String>,
        context: Timeline,
        window: ContinuationWindow,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: context,
            sampling: SamplingParams::default(),
            task: "MUSICGEM".to_string(),
            num_variants: 1,
            key: "CM".to_string(),
            instruments: Vec::new(),
            continuation: Some(window),
        }
    }
}

/// Everything a generator can come back with.
///
/// Callers must handle each variant explicitly: diagnostics are user-facing
/// text, never parsed as music, and an empty reply is a policy signal, not
/// an error.
#[derive(Debug, Clone)]
pub enum GeneratorReply {
    /// One or more decoded note segments.
    Segments(Vec<Timeline>),

    /// The service answered but produced no usable result.
    Empty,

    /// The service answered with explanatory text instead of note data.
    Diagnostic(String),
}

/// An external note-segment generator.
///
/// Transport failures surface as [`EngineError::Network`]; undecodable
/// responses as [`EngineError::Parse`].
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GeneratorReply, EngineError>;
}
