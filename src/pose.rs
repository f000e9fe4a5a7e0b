use crate::error::Error;
use num_traits::{FromPrimitive, ToPrimitive};
use serde::Serialize;
use std::ops::{Add, Mul, Sub};

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
)]
#[serde(rename_all = "snake_case")]
pub enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    pub fn idx(self) -> usize {
        // every variant is a small non-negative discriminant
        self.to_usize().unwrap_or_default()
    }

    pub fn from_idx(index: usize) -> Result<Self, Error> {
        Self::from_usize(index).ok_or(Error::ConvertUSizeToKeypointKind(index))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

pub const NUM_KEYPOINTS: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Self) -> f32 {
        let delta = other - self;
        delta.dot(delta).sqrt()
    }

    /// Direction of this vector in radians, measured by `atan2(y, x)`.
    #[inline]
    pub fn heading(self) -> f32 {
        self.y.atan2(self.x)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::Output {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Mul<(f32, f32)> for Point {
    type Output = Self;

    fn mul(self, (sx, sy): (f32, f32)) -> Self::Output {
        Self::Output {
            x: self.x * sx,
            y: self.y * sy,
        }
    }
}

/// A single landmark estimate. A keypoint with no `kind` is absent.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct Keypoint {
    pub kind: Option<KeypointKind>,
    pub point: Point,
    pub score: f32,
}

impl Keypoint {
    pub fn new(kind: KeypointKind, point: Point, score: f32) -> Self {
        Self {
            kind: Some(kind),
            point,
            score,
        }
    }
}

pub type Keypoints = [Keypoint; NUM_KEYPOINTS];

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Pose {
    pub keypoints: Keypoints,
    pub score: f32,
}

impl Pose {
    pub fn new(keypoints: Keypoints, score: f32) -> Self {
        Self { keypoints, score }
    }

    /// Build a pose from `[x, y, score]` triples in landmark order.
    pub fn from_triples(triples: &[[f32; 3]], score: f32) -> Result<Self, Error> {
        if triples.len() != NUM_KEYPOINTS {
            return Err(Error::KeypointCount(NUM_KEYPOINTS, triples.len()));
        }

        let mut keypoints: Keypoints = Default::default();
        for (i, &[x, y, kp_score]) in triples.iter().enumerate() {
            keypoints[i] = Keypoint::new(KeypointKind::from_idx(i)?, Point::new(x, y), kp_score);
        }
        Ok(Self::new(keypoints, score))
    }

    /// The keypoint for `kind`, if it is present.
    pub fn get(&self, kind: KeypointKind) -> Option<&Keypoint> {
        let keypoint = &self.keypoints[kind.idx()];
        keypoint.kind.map(|_| keypoint)
    }

    /// The keypoint for `kind` when present with at least `min_score` confidence.
    pub fn confident(&self, kind: KeypointKind, min_score: f32) -> Option<&Keypoint> {
        self.get(kind).filter(|keypoint| keypoint.score >= min_score)
    }

    /// Mark every keypoint below `min_score` as absent.
    pub fn retain_confident(mut self, min_score: f32) -> Self {
        for keypoint in self.keypoints.iter_mut() {
            if keypoint.score < min_score {
                *keypoint = Keypoint::default();
            }
        }
        self
    }
}

pub mod constants {
    use crate::pose::KeypointKind::{self, *};

    /// Minimum confidence for a keypoint to be considered at all.
    pub const MIN_KEYPOINT_SCORE: f32 = 0.1;

    pub const SKELETON_EDGES: [(KeypointKind, KeypointKind); 12] = [
        // arms
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        // torso
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        // legs
        (LeftHip, RightHip),
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
    ];
}
