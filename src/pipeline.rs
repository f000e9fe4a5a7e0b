//! Orchestration of one processing session: analysis, then encoding, with cancellation.

use crate::{
    analysis::AnalysisPhase,
    config::PipelineConfig,
    encoding::EncodingPhase,
    error::Error,
    exercise::{ExerciseMode, RepCounter},
    generation::{Generation, Generations, ResetHandle},
    media::{Canvas, EncodedVideo, EncoderSink, PoseSource, VideoSource},
    track::AnnotationTrack,
};
use std::{fmt, path::Path};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Analyzing,
    Encoding,
    Completed,
}

/// The phase a progress report belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Analyzing,
    Encoding,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Analyzing => "analyzing",
            Self::Encoding => "encoding",
        })
    }
}

pub type ProgressCallback = Box<dyn FnMut(Phase, f64)>;
pub type CompleteCallback = Box<dyn FnMut(&EncodedVideo)>;

/// Owns the media collaborators and runs them through analysis and encoding.
pub struct Pipeline<V, P, C, E> {
    video: V,
    pose_source: P,
    canvas: C,
    encoder: E,
    config: PipelineConfig,
    counter: RepCounter,
    track: Option<AnnotationTrack>,
    state: PipelineState,
    /// Session that produced the current `Completed` state.
    session: Option<Generation>,
    generations: Generations,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompleteCallback>,
}

/// Progress reporter for one phase that goes quiet once `generation` is superseded.
fn reporter<'a>(
    callback: &'a mut Option<ProgressCallback>,
    generation: &'a Generation,
    phase: Phase,
) -> impl FnMut(f64) + 'a {
    move |percent| {
        if !generation.is_current() {
            return;
        }
        if let Some(callback) = callback.as_mut() {
            callback(phase, percent);
        }
    }
}

impl<V, P, C, E> Pipeline<V, P, C, E>
where
    V: VideoSource,
    P: PoseSource<V::Frame>,
    C: Canvas<Frame = V::Frame>,
    E: EncoderSink<C>,
{
    pub fn new(video: V, canvas: C, pose_source: P, encoder: E, config: PipelineConfig) -> Self {
        let counter = RepCounter::new(ExerciseMode::default()).with_warm_up(config.warm_up());
        Self {
            video,
            pose_source,
            canvas,
            encoder,
            config,
            counter,
            track: None,
            state: PipelineState::Idle,
            session: None,
            generations: Generations::default(),
            on_progress: None,
            on_complete: None,
        }
    }

    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.on_progress = Some(callback);
    }

    pub fn on_complete(&mut self, callback: CompleteCallback) {
        self.on_complete = Some(callback);
    }

    /// A completed session reset through a [`ResetHandle`] reads as `Idle`.
    pub fn state(&self) -> PipelineState {
        if self.is_stale() {
            PipelineState::Idle
        } else {
            self.state
        }
    }

    fn is_stale(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| !session.is_current())
    }

    pub fn mode(&self) -> ExerciseMode {
        self.counter.mode()
    }

    pub fn counter(&self) -> &RepCounter {
        &self.counter
    }

    /// The track of the last completed analysis.
    pub fn track(&self) -> Option<&AnnotationTrack> {
        if self.is_stale() {
            None
        } else {
            self.track.as_ref()
        }
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    pub fn pose_source(&self) -> &P {
        &self.pose_source
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Handle that cancels the running session from anywhere, including progress callbacks and
    /// other threads.
    pub fn reset_handle(&self) -> ResetHandle {
        ResetHandle(self.generations.clone())
    }

    /// Switch exercise. Any previous track was counted for the old mode and is dropped.
    pub fn set_mode(&mut self, mode: ExerciseMode) {
        self.counter.set_mode(mode);
        self.track = None;
    }

    /// Cancel whatever is running and release every resource. Safe to call in any state, any
    /// number of times.
    pub fn reset(&mut self) {
        self.generations.advance();
        self.clean_up();
    }

    /// Analyze and encode the video at `path`.
    ///
    /// Returns `Ok(None)` when the session was reset before it finished. The completion callback
    /// only fires for a session that is still current.
    #[instrument(skip(self), level = "debug")]
    pub fn process(&mut self, path: &Path) -> Result<Option<EncodedVideo>, Error> {
        let generation = self.generations.advance();
        self.session = None;
        self.track = None;

        match self.run(path, &generation) {
            Ok(output) if generation.is_current() => {
                self.state = PipelineState::Completed;
                self.video.set_controls(true);
                info!(
                    message = "processing complete",
                    bytes = output.bytes.len(),
                    media_type = %output.media_type
                );
                if let Some(on_complete) = self.on_complete.as_mut() {
                    on_complete(&output);
                }
                self.session = Some(generation);
                Ok(Some(output))
            }
            Ok(_) => {
                info!(message = "processing superseded after encoding");
                self.clean_up();
                Ok(None)
            }
            Err(e) if e.is_superseded() => {
                info!(message = "processing reset", generation = generation.id());
                self.clean_up();
                Ok(None)
            }
            Err(e) => {
                error!(message = "processing failed", error = %e);
                self.clean_up();
                Err(e)
            }
        }
    }

    fn run(&mut self, path: &Path, generation: &Generation) -> Result<EncodedVideo, Error> {
        self.pose_source.init()?;
        generation.check()?;

        self.video.load(path)?;
        let metadata_timeout = self.config.metadata_timeout();
        let video = &mut self.video;
        if !generation.wait_until(metadata_timeout, self.config.poll_interval(), || {
            video.metadata_ready()
        })? {
            return Err(Error::MetadataTimeout(metadata_timeout));
        }

        self.state = PipelineState::Analyzing;
        info!(message = "state changed", state = ?self.state, mode = %self.counter.mode());
        let track = AnalysisPhase::new(&self.config, generation).run(
            &mut self.video,
            &mut self.pose_source,
            &mut self.counter,
            &mut reporter(&mut self.on_progress, generation, Phase::Analyzing),
        )?;
        let track = self.track.insert(track);

        self.state = PipelineState::Encoding;
        info!(message = "state changed", state = ?self.state);
        EncodingPhase::new(&self.config, generation).run(
            &mut self.video,
            &mut self.canvas,
            &mut self.encoder,
            track,
            &mut reporter(&mut self.on_progress, generation, Phase::Encoding),
        )
    }

    fn clean_up(&mut self) {
        if self.encoder.is_recording() {
            if let Err(e) = self.encoder.stop() {
                warn!(message = "failed to stop encoder during reset", error = %e);
            }
        }
        if let Err(e) = self.video.pause() {
            warn!(message = "failed to pause video during reset", error = %e);
        }
        self.video.release();
        self.video.set_controls(true);
        if let Err(e) = self.canvas.clear() {
            warn!(message = "failed to clear canvas during reset", error = %e);
        }
        self.counter.reset();
        self.track = None;
        self.session = None;
        self.state = PipelineState::Idle;
    }
}
