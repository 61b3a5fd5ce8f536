//! longplay - a generative MIDI timeline engine.
//!
//! Edit a multi-track note timeline, play it back against a transport
//! clock, and continuously splice machine-generated continuations onto its
//! end while it plays. Splicing never doubles a trigger, a stopped session
//! never merges a late result, and generation is throttled against the
//! playback cursor so it cannot run unboundedly ahead.
//!
//! The piano-roll UI, the model service, and the audio device are external
//! collaborators; this crate holds the data model, measure selection,
//! mute/solo routing, transport scheduling, segment merging, and the
//! self-throttling generation session loop that ties them together.

pub mod audio;
pub mod editor;
pub mod error;
pub mod generator;
pub mod merge;
pub mod mixer;
pub mod score;
pub mod selection;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use audio::{AudioSink, EventId, SynthSink};
pub use editor::Editor;
pub use error::EngineError;
pub use generator::{
    GenerateRequest, Generator, GeneratorReply, HttpGenerator, ModelInfo, ModelRegistry,
};
pub use merge::append_segment;
pub use mixer::MuteSoloRouter;
pub use score::{Note, NoteId, Timeline, Track, TrackId, TICKS_PER_BEAT};
pub use selection::MeasureSelection;
pub use session::{GenerationSession, SessionConfig, SessionHandle, SessionState};
pub use transport::{PlaybackState, Transport};

/// Installs a `tracing` subscriber honoring `RUST_LOG`, for hosts and
/// examples that have no logging setup of their own. Safe to call once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
