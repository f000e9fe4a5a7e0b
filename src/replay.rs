//! Poses estimated ahead of time by an external model, replayed by frame time.

use crate::{
    error::Error,
    media::{PoseSource, TimedFrame},
    pose::Pose,
    track::{validate_step, DEFAULT_STEP},
};
use ordered_float::NotNan;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct RawPose {
    score: f32,
    keypoints: Vec<[f32; 3]>,
}

#[derive(Debug, Deserialize)]
struct RawSample {
    time: f64,
    poses: Vec<RawPose>,
}

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    time: NotNan<f64>,
    poses: Vec<Pose>,
}

/// [`PoseSource`] backed by a JSON file of the form
/// `[{"time": t, "poses": [{"score": s, "keypoints": [[x, y, c], ...]}]}]`.
#[derive(Debug, Clone)]
pub struct PoseReplay {
    path: PathBuf,
    tolerance: f64,
    samples: Vec<Sample>,
}

impl PoseReplay {
    /// Poses are matched to frames sampled `step` seconds apart.
    pub fn new<P: AsRef<Path>>(path: P, step: f64) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            tolerance: validate_step(step).unwrap_or(DEFAULT_STEP) / 2.0,
            samples: vec![],
        }
    }

    pub fn from_json(json: &str, path: &Path, step: f64) -> Result<Self, Error> {
        let mut replay = Self::new(path, step);
        replay.samples = parse(json, path)?;
        Ok(replay)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Poses of the sample nearest to `time`, if one lies within half a step.
    pub fn poses_at(&self, time: f64) -> &[Pose] {
        let key = match NotNan::new(time) {
            Ok(key) => key,
            Err(_) => return &[],
        };
        let distance = |sample: &Sample| (sample.time.into_inner() - time).abs();

        let after = self.samples.partition_point(|sample| sample.time < key);
        let nearest = [after.checked_sub(1), Some(after)]
            .iter()
            .flatten()
            .filter_map(|&i| self.samples.get(i))
            .fold(None, |best: Option<&Sample>, sample| match best {
                Some(best) if distance(best) <= distance(sample) => Some(best),
                _ => Some(sample),
            });

        match nearest {
            Some(sample) if distance(sample) <= self.tolerance => &sample.poses,
            _ => &[],
        }
    }
}

fn parse(json: &str, path: &Path) -> Result<Vec<Sample>, Error> {
    let raw: Vec<RawSample> =
        serde_json::from_str(json).map_err(|e| Error::ParsePoseFile(e, path.to_owned()))?;

    let mut samples = raw
        .into_iter()
        .filter_map(|sample| NotNan::new(sample.time).ok().map(|time| (time, sample.poses)))
        .map(|(time, poses)| {
            let poses = poses
                .iter()
                .map(|pose| Pose::from_triples(&pose.keypoints, pose.score))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Sample { time, poses })
        })
        .collect::<Result<Vec<_>, Error>>()?;
    samples.sort_by_key(|sample| sample.time);
    Ok(samples)
}

impl<F> PoseSource<F> for PoseReplay
where
    F: TimedFrame,
{
    #[instrument(skip(self), fields(path = ?self.path))]
    fn init(&mut self) -> Result<(), Error> {
        if !self.samples.is_empty() {
            return Ok(());
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| Error::ReadPoseFile(e, self.path.clone()))
            .map_err(|e| Error::InitializePoseSource(Box::new(e)))?;
        self.samples =
            parse(&json, &self.path).map_err(|e| Error::InitializePoseSource(Box::new(e)))?;
        info!(message = "loaded pose replay", samples = self.samples.len());
        Ok(())
    }

    fn estimate(&mut self, frame: &F) -> Result<Vec<Pose>, Error> {
        let poses = self.poses_at(frame.time()).to_vec();
        debug!(time = frame.time(), poses = poses.len());
        Ok(poses)
    }
}
