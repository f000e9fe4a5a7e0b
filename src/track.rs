use crate::{
    error::Error,
    exercise::{CountResult, ExerciseMode},
    pose::Pose,
};
use num_traits::ToPrimitive;
use serde::Serialize;

/// Default sampling interval of the analysis pass, in seconds.
pub const DEFAULT_STEP: f64 = 0.05;

/// Slack allowed when deciding whether the last sample still falls inside the video.
const SAMPLE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationEntry {
    pub time: f64,
    pub pose: Option<Pose>,
    pub result: Option<CountResult>,
}

impl AnnotationEntry {
    /// A sample whose estimate failed or found nobody.
    pub fn empty(time: f64) -> Self {
        Self {
            time,
            pose: None,
            result: None,
        }
    }
}

/// Time-indexed record of the analysis pass. Entry `i` belongs to time `i * step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationTrack {
    step: f64,
    mode: ExerciseMode,
    entries: Vec<AnnotationEntry>,
}

impl AnnotationTrack {
    pub(crate) fn new(step: f64, mode: ExerciseMode, entries: Vec<AnnotationEntry>) -> Self {
        Self {
            step,
            mode,
            entries,
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    pub fn entries(&self) -> &[AnnotationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the sample nearest to `time`, clamped into the track.
    pub fn index_at(&self, time: f64) -> Option<usize> {
        let last = self.entries.len().checked_sub(1)?;
        let raw = (time / self.step).round();
        let index = if raw.is_nan() || raw <= 0.0 {
            0
        } else {
            raw.to_usize().unwrap_or(last)
        };
        Some(index.min(last))
    }

    /// The sample nearest to `time`. Never out of range; `None` only for an empty track.
    pub fn entry_at(&self, time: f64) -> Option<&AnnotationEntry> {
        self.index_at(time).map(|index| &self.entries[index])
    }

    /// Every count result in sample order.
    pub fn results(&self) -> impl Iterator<Item = Option<&CountResult>> {
        self.entries.iter().map(|entry| entry.result.as_ref())
    }
}

pub(crate) fn validate_step(step: f64) -> Result<f64, Error> {
    if step.is_finite() && step > 0.0 {
        Ok(step)
    } else {
        Err(Error::InvalidStep(step))
    }
}

/// Number of samples `0, step, 2 step, ...` that fall within `duration`.
pub(crate) fn sample_count(duration: f64, step: f64) -> Result<usize, Error> {
    let step = validate_step(step)?;
    (duration.max(0.0) / step + SAMPLE_EPSILON)
        .floor()
        .to_usize()
        .map(|n| n + 1)
        .ok_or(Error::ConvertToUSize)
}
