//! The offline pass: step through the video, estimate poses, count reps and record everything
//! into an [`AnnotationTrack`].

use crate::{
    config::PipelineConfig,
    error::Error,
    exercise::RepCounter,
    generation::Generation,
    media::{PoseSource, VideoSource},
    pose::{constants::MIN_KEYPOINT_SCORE, KeypointKind, Pose},
    track::{sample_count, validate_step, AnnotationEntry, AnnotationTrack},
};
use ordered_float::NotNan;
use tracing::{debug, info, instrument, trace, warn};

/// Picks the subject to follow out of everyone detected in a frame.
pub trait SubjectSelector {
    fn select(&self, poses: Vec<Pose>) -> Option<Pose>;
}

/// Follows whoever is furthest to the right, judged by the nose. Not a tracker: subjects crossing
/// each other swap identities.
#[derive(Debug, Clone, Copy)]
pub struct Rightmost {
    pub min_score: f32,
}

impl Default for Rightmost {
    fn default() -> Self {
        Self { min_score: 0.1 }
    }
}

impl SubjectSelector for Rightmost {
    fn select(&self, poses: Vec<Pose>) -> Option<Pose> {
        poses
            .into_iter()
            .filter(|pose| pose.score > self.min_score)
            .filter_map(|pose| {
                NotNan::new(pose.keypoints[KeypointKind::Nose.idx()].point.x)
                    .ok()
                    .map(|x| (x, pose))
            })
            // ties go to the earliest detection
            .reduce(|best, next| if next.0 > best.0 { next } else { best })
            .map(|(_, pose)| pose)
    }
}

/// Length of the video to analyze, never unbounded.
fn known_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|seconds| seconds.is_finite() && *seconds > 0.0)
}

fn percent(time: f64, duration: f64) -> f64 {
    (time / duration * 100.0).clamp(0.0, 100.0)
}

pub struct AnalysisPhase<'a, S = Rightmost> {
    config: &'a PipelineConfig,
    generation: &'a Generation,
    selector: S,
}

impl<'a> AnalysisPhase<'a, Rightmost> {
    pub fn new(config: &'a PipelineConfig, generation: &'a Generation) -> Self {
        Self::with_selector(
            config,
            generation,
            Rightmost {
                min_score: config.min_pose_score,
            },
        )
    }
}

impl<'a, S> AnalysisPhase<'a, S>
where
    S: SubjectSelector,
{
    pub fn with_selector(
        config: &'a PipelineConfig,
        generation: &'a Generation,
        selector: S,
    ) -> Self {
        Self {
            config,
            generation,
            selector,
        }
    }

    /// Sample the whole video once every `config.step` seconds.
    ///
    /// Samples run strictly one after another: seek, wait for the seek, settle, wait for a decoded
    /// frame, estimate, record. A sample that fails is recorded empty and the pass moves on.
    #[instrument(name = "AnalysisPhase::run", skip_all, level = "debug", fields(generation = self.generation.id()))]
    pub fn run<V, P>(
        &self,
        video: &mut V,
        pose_source: &mut P,
        counter: &mut RepCounter,
        progress: &mut dyn FnMut(f64),
    ) -> Result<AnnotationTrack, Error>
    where
        V: VideoSource,
        P: PoseSource<V::Frame>,
    {
        let step = validate_step(self.config.step)?;

        video.set_muted(true);
        video.set_controls(false);
        video.pause()?;
        counter.reset();

        let duration = self.resolve_duration(video)?;
        let samples = sample_count(duration, step)?;
        info!(
            message = "analyzing",
            duration,
            step,
            samples,
            mode = %counter.mode()
        );

        let mut entries = Vec::with_capacity(samples);
        let mut failures = 0_usize;

        for i in 0..samples {
            let time = i as f64 * step;
            self.generation.check()?;
            progress(percent(time, duration));

            let entry = match self.sample(video, pose_source, time) {
                Ok(Some(pose)) => {
                    let result = counter.process(&pose, time);
                    trace!(time, count = result.count, feedback = %result.feedback, debug = %result.debug);
                    AnnotationEntry {
                        time,
                        pose: Some(pose),
                        result: Some(result),
                    }
                }
                Ok(None) => AnnotationEntry::empty(time),
                Err(error) if error.is_superseded() => return Err(error),
                Err(error) => {
                    failures += 1;
                    warn!(message = "skipping sample", time, error = %error);
                    AnnotationEntry::empty(time)
                }
            };
            entries.push(entry);
        }

        progress(100.0);
        info!(
            message = "analysis finished",
            samples = entries.len(),
            failures,
            count = counter.count()
        );
        Ok(AnnotationTrack::new(step, counter.mode(), entries))
    }

    fn resolve_duration<V>(&self, video: &V) -> Result<f64, Error>
    where
        V: VideoSource,
    {
        let max_duration = self.config.max_duration;
        if let Some(duration) = known_duration(video.duration()) {
            if duration > max_duration {
                warn!(
                    message = "duration exceeds the maximum, truncating",
                    duration,
                    max_duration
                );
                return Ok(max_duration);
            }
            return Ok(duration);
        }

        debug!(message = "duration unknown, waiting once", retry = ?self.config.duration_retry());
        self.generation
            .sleep(self.config.duration_retry(), self.config.poll_interval())?;

        Ok(known_duration(video.duration()).unwrap_or_else(|| {
            warn!(
                message = "duration still unknown, using the maximum",
                max_duration
            );
            max_duration
        }))
    }

    fn sample<V, P>(
        &self,
        video: &mut V,
        pose_source: &mut P,
        time: f64,
    ) -> Result<Option<Pose>, Error>
    where
        V: VideoSource,
        P: PoseSource<V::Frame>,
    {
        let poll = self.config.poll_interval();

        video.seek(time)?;
        let seek_timeout = self.config.seek_timeout();
        if !self
            .generation
            .wait_until(seek_timeout, poll, || video.seek_completed())?
        {
            return Err(Error::SeekTimeout(time, seek_timeout));
        }

        self.generation.sleep(self.config.settle_delay(), poll)?;

        let frame_timeout = self.config.frame_timeout();
        if !self
            .generation
            .wait_until(frame_timeout, poll, || video.frame_decoded())?
        {
            return Err(Error::FrameTimeout(time, frame_timeout));
        }

        let frame = video.frame()?;
        let poses = pose_source.estimate(&frame)?;
        Ok(self
            .selector
            .select(poses)
            .map(|pose| pose.retain_confident(MIN_KEYPOINT_SCORE)))
    }
}
