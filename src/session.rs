//! Generation session controller.
//!
//! Drives the continuous generate-and-merge loop: pick an opening clip,
//! then repeatedly condition the generator on the composition's tail,
//! splice the result onto the end, and republish the schedule. The loop
//! throttles against the playback cursor so generation never runs
//! unboundedly ahead, and gates playback start so the buffer cannot starve.
//!
//! The loop is a single cancellable task. There is no timer-callback chain
//! and no shared mutable state: the session owns its composition, at most
//! one generation request is in flight at a time (each cycle is awaited
//! fully), and the `active` flag is checked before every side-effecting
//! step, including once more after each await. A result that resolves
//! after the user has exited is discarded instead of merged.

use crate::audio::AudioSink;
use crate::error::EngineError;
use crate::generator::{ContinuationWindow, GenerateRequest, Generator, GeneratorReply};
use crate::merge::append_segment;
use crate::mixer::MuteSoloRouter;
use crate::score::Timeline;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tuning knobs for a generation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of independent opening candidates requested up front.
    pub initial_clip_count: u32,

    /// Playback starts once the composition exceeds this many measures.
    /// Generation gets this far ahead before audio begins, so the buffer
    /// cannot starve on the first notes.
    pub playback_start_measures: f64,

    /// Generation pauses while the un-played buffer exceeds this many
    /// measures. At exactly the threshold the loop proceeds; only strictly
    /// more throttles.
    pub buffer_ahead_threshold_measures: f64,

    /// How long a throttled loop sleeps before re-evaluating.
    pub poll_interval: Duration,

    /// Trailing measures of the composition re-sent as generator context.
    pub context_measures: u32,

    /// New measures requested per continuation.
    pub extension_measures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_clip_count: 3,
            playback_start_measures: 16.0,
            buffer_ahead_threshold_measures: 16.0,
            poll_interval: Duration::from_millis(2000),
            context_measures: 4,
            extension_measures: 8,
        }
    }
}

/// Lifecycle state of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created; nothing requested yet.
    Idle,
    /// Waiting for the initial candidate batch.
    AwaitingInitialClips,
    /// Candidates in hand; waiting for the user to pick one.
    AwaitingSelection,
    /// The generate-merge loop is running.
    Looping,
    /// The loop is waiting for playback to catch up.
    Throttled,
    /// The user exited; the loop has wound down.
    Stopped,
    /// An unrecoverable generator error halted the loop.
    Failed,
}

/// Cloneable stop handle for a running session.
#[derive(Clone)]
pub struct SessionHandle {
    active: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Requests the session to stop. The loop winds down at its next
    /// liveness check; an in-flight generation result is discarded.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Returns whether the session is still live.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// A continuous generation session: the accumulating composition plus the
/// control state of the loop that extends it.
pub struct GenerationSession {
    id: Uuid,
    model: String,
    config: SessionConfig,
    composition: Timeline,
    /// Audibility routing for the composition's tracks.
    pub mixer: MuteSoloRouter,
    state: SessionState,
    active: Arc<AtomicBool>,
}

impl GenerationSession {
    /// Creates an idle session for the given model.
    pub fn new(model: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            config,
            composition: Timeline::new("Session"),
            mixer: MuteSoloRouter::new(),
            state: SessionState::Idle,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the session's unique id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the accumulating composition.
    pub fn composition(&self) -> &Timeline {
        &self.composition
    }

    /// Returns a stop handle usable from outside the loop.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            active: Arc::clone(&self.active),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Requests the initial batch of independent opening candidates, with
    /// no prior context.
    ///
    /// On success the session moves to `AwaitingSelection`. An empty reply
    /// leaves the session idle with no candidates; a diagnostic or
    /// transport failure also returns the session to idle so the user can
    /// retry with different settings.
    pub async fn request_initial_clips<G>(
        &mut self,
        generator: &G,
    ) -> Result<Vec<Timeline>, EngineError>
    where
        G: Generator + ?Sized,
    {
        if !matches!(self.state, SessionState::Idle | SessionState::AwaitingSelection) {
            return Err(EngineError::InvalidState(
                "initial clips can only be requested before the loop starts",
            ));
        }

        self.state = SessionState::AwaitingInitialClips;
        info!(session = %self.id, model = %self.model, count = self.config.initial_clip_count,
            "requesting opening candidates");

        let request = GenerateRequest::variations(
            self.model.clone(),
            Timeline::new("Prompt"),
            self.config.initial_clip_count,
        );

        match generator.generate(request).await {
            Ok(GeneratorReply::Segments(clips)) if !clips.is_empty() => {
                self.state = SessionState::AwaitingSelection;
                Ok(clips)
            }
            Ok(GeneratorReply::Segments(_)) | Ok(GeneratorReply::Empty) => {
                warn!(session = %self.id, "generator returned no opening candidates");
                self.state = SessionState::Idle;
                Ok(Vec::new())
            }
            Ok(GeneratorReply::Diagnostic(text)) => {
                self.state = SessionState::Idle;
                Err(EngineError::Parse(text))
            }
            Err(err) => {
                self.state = SessionState::Idle;
                Err(err)
            }
        }
    }

    /// Commits to an opening clip: the candidate is cloned (never aliased)
    /// into the session's composition and the session becomes ready to run.
    pub fn select_clip(&mut self, clip: &Timeline) -> Result<(), EngineError> {
        if self.state != SessionState::AwaitingSelection {
            return Err(EngineError::InvalidState(
                "selecting a clip requires candidates in hand",
            ));
        }
        self.composition = clip.clone();
        self.active.store(true, Ordering::SeqCst);
        self.state = SessionState::Looping;
        info!(session = %self.id, duration_seconds = self.composition.duration_seconds(),
            "opening clip selected");
        Ok(())
    }

    /// Stops the session from the owning side.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.state = SessionState::Stopped;
    }

    /// Runs the generate-merge loop until the session is stopped or fails.
    ///
    /// Requires a selected opening clip. Each iteration fully awaits its
    /// generation request before the next begins, so at most one request is
    /// ever in flight.
    pub async fn run<G, S>(
        &mut self,
        generator: &G,
        transport: &mut Transport<S>,
    ) -> Result<(), EngineError>
    where
        G: Generator + ?Sized,
        S: AudioSink,
    {
        if self.state != SessionState::Looping {
            return Err(EngineError::InvalidState(
                "running the loop requires a selected opening clip",
            ));
        }

        loop {
            if !self.is_active() {
                self.state = SessionState::Stopped;
                break;
            }

            let spm = self.composition.seconds_per_measure();
            let total_measures = self.composition.duration_measures();

            // Playback gate: audio begins only once generation has banked
            // enough material. Rescheduling first makes play() pick up the
            // full composition.
            if total_measures > self.config.playback_start_measures && !transport.is_playing() {
                info!(session = %self.id, total_measures, "buffer filled; starting playback");
                transport.reschedule(&self.composition, &self.mixer);
                transport.play();
            }

            // Throttle: how far ahead of the live cursor is the buffered
            // material? Strictly above the threshold waits; at the
            // threshold the loop proceeds.
            let cursor_measures = transport.position_seconds() / spm;
            let future_buffer = total_measures - cursor_measures;
            if future_buffer > self.config.buffer_ahead_threshold_measures {
                debug!(session = %self.id, future_buffer, "buffer ahead; throttling");
                self.state = SessionState::Throttled;
                tokio::time::sleep(self.config.poll_interval).await;
                // The resume must do nothing if the user exited meanwhile.
                if !self.is_active() {
                    self.state = SessionState::Stopped;
                    break;
                }
                self.state = SessionState::Looping;
                continue;
            }

            let context = self.composition.tail_context(self.config.context_measures);
            let request = GenerateRequest::continuation(
                self.model.clone(),
                context,
                ContinuationWindow {
                    context_measures: self.config.context_measures,
                    extension_measures: self.config.extension_measures,
                },
            );

            let reply = generator.generate(request).await;

            // The request may have resolved after a stop: discard rather
            // than merge, so no ghost continuation reappears.
            if !self.is_active() {
                debug!(session = %self.id, "discarding in-flight result after stop");
                self.state = SessionState::Stopped;
                break;
            }

            match reply {
                Ok(GeneratorReply::Segments(segments)) if !segments.is_empty() => {
                    let appended = append_segment(
                        &mut self.composition,
                        &segments[0],
                        self.config.context_measures,
                    );
                    if appended == 0 {
                        // No-op extension: logged by the merge, loop goes on.
                        continue;
                    }
                    // Publish for live playback: atomic cancel-then-
                    // reschedule, cursor untouched.
                    transport.reschedule(&self.composition, &self.mixer);
                    debug!(session = %self.id,
                        duration_measures = self.composition.duration_measures(),
                        "composition extended");
                }
                Ok(GeneratorReply::Segments(_)) | Ok(GeneratorReply::Empty) => {
                    // Nothing came back; stopping beats spinning a tight
                    // retry loop against a dry generator.
                    warn!(session = %self.id, "generator returned no results; stopping loop");
                    self.active.store(false, Ordering::SeqCst);
                    self.state = SessionState::Stopped;
                    break;
                }
                Ok(GeneratorReply::Diagnostic(text)) => {
                    error!(session = %self.id, diagnostic = %text, "generator sent a diagnostic");
                    self.active.store(false, Ordering::SeqCst);
                    self.state = SessionState::Failed;
                    return Err(EngineError::Parse(text));
                }
                Err(err) => {
                    error!(session = %self.id, error = %err, "generation failed; halting loop");
                    self.active.store(false, Ordering::SeqCst);
                    self.state = SessionState::Failed;
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
