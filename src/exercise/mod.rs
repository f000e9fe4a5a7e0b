//! Repetition counting.
//!
//! A [`RepCounter`] turns a stream of poses into a monotonic repetition count. Each exercise
//! variant extracts its own features from a pose, checks them against its thresholds and
//! transitions the shared [`Tally`].

use crate::pose::{
    constants::MIN_KEYPOINT_SCORE,
    KeypointKind::{self, *},
    Point, Pose,
};
use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

mod pushup;
mod situp;

pub use pushup::Pushup;
pub use situp::Situp;

/// Default warm-up window in seconds.
pub const WARM_UP_SECONDS: f64 = 3.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseMode {
    Pushup,
    Situp,
}

impl Default for ExerciseMode {
    fn default() -> Self {
        Self::Pushup
    }
}

impl ExerciseMode {
    /// Joints the mode measures, highlighted when drawing the skeleton.
    pub fn tracked_joints(self) -> &'static [KeypointKind] {
        match self {
            Self::Pushup => &[
                LeftShoulder,
                RightShoulder,
                LeftElbow,
                RightElbow,
                LeftWrist,
                RightWrist,
            ],
            Self::Situp => &[
                LeftShoulder,
                RightShoulder,
                LeftElbow,
                RightElbow,
                LeftHip,
                RightHip,
                LeftKnee,
                RightKnee,
            ],
        }
    }
}

impl fmt::Display for ExerciseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pushup => "pushup",
            Self::Situp => "situp",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown exercise mode: {0:?} (expected pushup or situp)")]
pub struct ParseModeError(String);

impl FromStr for ExerciseMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pushup" | "push-up" => Ok(Self::Pushup),
            "situp" | "sit-up" => Ok(Self::Situp),
            _ => Err(ParseModeError(s.to_owned())),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    Rest,
    ActionEntered,
    Counted,
}

impl Default for ExerciseState {
    fn default() -> Self {
        Self::Rest
    }
}

/// Short status label shown under the count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Feedback {
    Ready,
    PoseInsufficient,
    WarmUp { remaining: u32 },
    Down,
    Up,
    SitupCounted,
    DownNow,
    SitupReset,
    NearMiss { best: u32 },
}

impl Default for Feedback {
    fn default() -> Self {
        Self::Ready
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::PoseInsufficient => f.write_str("Pose?"),
            Self::WarmUp { remaining } => write!(f, "Starting in {}...", remaining),
            Self::Down => f.write_str("Down ▼"),
            Self::Up => f.write_str("Up ▲"),
            Self::SitupCounted => f.write_str("Sit-up! ▲"),
            Self::DownNow => f.write_str("Down Now ▼"),
            Self::SitupReset => f.write_str("Down (Reset)"),
            Self::NearMiss { best } => write!(f, "No Count: Best {}°", best),
        }
    }
}

impl Serialize for Feedback {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountResult {
    pub count: u32,
    pub feedback: Feedback,
    pub debug: String,
}

/// Mutable counting state shared by every exercise variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub count: u32,
    pub state: ExerciseState,
    pub feedback: Feedback,
    pub debug: String,
}

impl Tally {
    fn snapshot(&self) -> CountResult {
        CountResult {
            count: self.count,
            feedback: self.feedback,
            debug: self.debug.clone(),
        }
    }
}

pub trait Exercise {
    type Features;

    /// Pull the features this exercise measures out of a pose, if enough of it is visible.
    fn extract(&self, pose: &Pose) -> Option<Self::Features>;

    /// Render raw feature values for the diagnostic line.
    fn describe(features: &Self::Features) -> String;

    /// Evaluate thresholds and move the tally to its next state.
    fn transition(&mut self, features: &Self::Features, timestamp: f64, tally: &mut Tally);

    /// Forget any per-variant memory (debounce timers, minimums).
    fn reset(&mut self);
}

fn step<E>(exercise: &mut E, pose: &Pose, timestamp: f64, tally: &mut Tally)
where
    E: Exercise,
{
    match exercise.extract(pose) {
        Some(features) => {
            tally.debug = E::describe(&features);
            exercise.transition(&features, timestamp, tally);
        }
        None => {
            tally.feedback = Feedback::PoseInsufficient;
            tally.debug = "Need Points".to_owned();
        }
    }
}

#[derive(Debug, Clone)]
enum Variant {
    Pushup(Pushup),
    Situp(Situp),
}

impl Variant {
    fn new(mode: ExerciseMode) -> Self {
        match mode {
            ExerciseMode::Pushup => Self::Pushup(Pushup::default()),
            ExerciseMode::Situp => Self::Situp(Situp::default()),
        }
    }

    fn step(&mut self, pose: &Pose, timestamp: f64, tally: &mut Tally) {
        match self {
            Self::Pushup(e) => step(e, pose, timestamp, tally),
            Self::Situp(e) => step(e, pose, timestamp, tally),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Pushup(e) => e.reset(),
            Self::Situp(e) => e.reset(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    mode: ExerciseMode,
    variant: Variant,
    tally: Tally,
    warm_up: Option<f64>,
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(ExerciseMode::default())
    }
}

impl RepCounter {
    pub fn new(mode: ExerciseMode) -> Self {
        Self {
            mode,
            variant: Variant::new(mode),
            tally: Tally::default(),
            warm_up: Some(WARM_UP_SECONDS),
        }
    }

    /// Suppress counting for timestamps below `seconds`. `None` or a non-positive window disables
    /// the warm-up.
    pub fn with_warm_up(mut self, seconds: Option<f64>) -> Self {
        self.warm_up = seconds.filter(|s| *s > 0.0);
        self
    }

    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    pub fn count(&self) -> u32 {
        self.tally.count
    }

    pub fn state(&self) -> ExerciseState {
        self.tally.state
    }

    pub fn set_mode(&mut self, mode: ExerciseMode) {
        self.mode = mode;
        self.variant = Variant::new(mode);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.tally = Tally::default();
        self.variant.reset();
    }

    pub fn process(&mut self, pose: &Pose, timestamp: f64) -> CountResult {
        if let Some(window) = self.warm_up {
            if timestamp < window {
                let remaining = (window - timestamp.floor()).max(0.0);
                return CountResult {
                    count: self.tally.count,
                    feedback: Feedback::WarmUp {
                        remaining: remaining as u32,
                    },
                    debug: "Warm-up".to_owned(),
                };
            }
        }

        self.variant.step(pose, timestamp, &mut self.tally);
        self.tally.snapshot()
    }
}

/// The angle at `vertex` between the rays towards `a` and `c`, in degrees within `[0, 180]`.
pub fn joint_angle(a: Point, vertex: Point, c: Point) -> f32 {
    let radians = (c - vertex).heading() - (a - vertex).heading();
    let degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    }
}

/// One side of the body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Side {
    pub(crate) shoulder: KeypointKind,
    pub(crate) elbow: KeypointKind,
    pub(crate) wrist: KeypointKind,
    pub(crate) hip: KeypointKind,
    pub(crate) knee: KeypointKind,
}

pub(crate) const LEFT: Side = Side {
    shoulder: LeftShoulder,
    elbow: LeftElbow,
    wrist: LeftWrist,
    hip: LeftHip,
    knee: LeftKnee,
};

pub(crate) const RIGHT: Side = Side {
    shoulder: RightShoulder,
    elbow: RightElbow,
    wrist: RightWrist,
    hip: RightHip,
    knee: RightKnee,
};

/// Summed confidence of the usable keypoints in `chain`.
fn chain_score(pose: &Pose, chain: &[KeypointKind]) -> f32 {
    chain
        .iter()
        .filter_map(|&kind| pose.confident(kind, MIN_KEYPOINT_SCORE))
        .map(|keypoint| keypoint.score)
        .sum()
}

/// Pick the side whose joint chain is seen more confidently, provided its total exceeds
/// `min_total`. Ties go to the right side.
pub(crate) fn select_side(
    pose: &Pose,
    chain: impl Fn(&Side) -> [KeypointKind; 3],
    min_total: f32,
) -> Option<Side> {
    let left = chain_score(pose, &chain(&LEFT));
    let right = chain_score(pose, &chain(&RIGHT));

    if left > right && left > min_total {
        Some(LEFT)
    } else if right > min_total {
        Some(RIGHT)
    } else {
        None
    }
}

/// Position of a usable keypoint.
pub(crate) fn usable(pose: &Pose, kind: KeypointKind) -> Option<Point> {
    pose.confident(kind, MIN_KEYPOINT_SCORE)
        .map(|keypoint| keypoint.point)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pose::{Keypoint, Keypoints};
    use assert_approx_eq::assert_approx_eq;

    /// A pose with every keypoint at the origin and absent unless set.
    pub(crate) fn pose_with(points: &[(KeypointKind, f32, f32, f32)]) -> Pose {
        let mut keypoints: Keypoints = Default::default();
        for &(kind, x, y, score) in points {
            keypoints[kind.idx()] = Keypoint::new(kind, Point::new(x, y), score);
        }
        Pose::new(keypoints, 0.9)
    }

    /// A left arm whose elbow is bent to `degrees`.
    pub(crate) fn arm_at(degrees: f32) -> Pose {
        let radians = degrees.to_radians();
        pose_with(&[
            (LeftShoulder, 100.0, 0.0, 0.9),
            (LeftElbow, 0.0, 0.0, 0.9),
            (LeftWrist, 100.0 * radians.cos(), 100.0 * radians.sin(), 0.9),
        ])
    }

    #[test]
    fn right_angle() {
        let angle = joint_angle(
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
        );
        assert_approx_eq!(angle, 90.0, 1e-4);
    }

    #[test]
    fn angle_is_normalized_into_half_turn() {
        let angle = joint_angle(
            Point::new(1.0, -0.1),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
        );
        assert!(angle < 15.0, "{}", angle);
        let straight = joint_angle(
            Point::new(-1.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        );
        assert_approx_eq!(straight, 180.0, 1e-4);
    }

    #[test]
    fn arm_fixture_matches_requested_angle() {
        let pose = arm_at(85.0);
        let angle = joint_angle(
            pose.keypoints[LeftShoulder.idx()].point,
            pose.keypoints[LeftElbow.idx()].point,
            pose.keypoints[LeftWrist.idx()].point,
        );
        assert_approx_eq!(angle, 85.0, 1e-3);
    }

    #[test]
    fn side_selection_prefers_confident_side() {
        let pose = pose_with(&[
            (LeftShoulder, 0.0, 0.0, 0.2),
            (LeftElbow, 0.0, 0.0, 0.2),
            (LeftWrist, 0.0, 0.0, 0.2),
            (RightShoulder, 0.0, 0.0, 0.5),
            (RightElbow, 0.0, 0.0, 0.5),
            (RightWrist, 0.0, 0.0, 0.5),
        ]);
        let side = select_side(&pose, |s| [s.shoulder, s.elbow, s.wrist], 0.9);
        assert_eq!(side, Some(RIGHT));
    }

    #[test]
    fn side_selection_requires_minimum_total() {
        let pose = pose_with(&[
            (LeftShoulder, 0.0, 0.0, 0.3),
            (LeftElbow, 0.0, 0.0, 0.3),
            (LeftWrist, 0.0, 0.0, 0.25),
        ]);
        assert_eq!(
            select_side(&pose, |s| [s.shoulder, s.elbow, s.wrist], 0.9),
            None
        );
    }

    #[test]
    fn low_confidence_points_do_not_count_towards_side() {
        let pose = pose_with(&[
            (LeftShoulder, 0.0, 0.0, 0.09),
            (LeftElbow, 0.0, 0.0, 0.9),
            (LeftWrist, 0.0, 0.0, 0.05),
        ]);
        assert_eq!(
            select_side(&pose, |s| [s.shoulder, s.elbow, s.wrist], 0.9),
            None
        );
    }

    #[test]
    fn warm_up_freezes_counting() {
        let mut counter = RepCounter::new(ExerciseMode::Pushup);
        let result = counter.process(&arm_at(85.0), 0.4);
        assert_eq!(result.feedback, Feedback::WarmUp { remaining: 3 });
        assert_eq!(result.debug, "Warm-up");
        let result = counter.process(&arm_at(170.0), 2.5);
        assert_eq!(result.feedback, Feedback::WarmUp { remaining: 1 });
        assert_eq!(result.count, 0);
        assert_eq!(counter.state(), ExerciseState::Rest);

        // the frozen "down" above must not have been remembered
        assert_eq!(counter.process(&arm_at(170.0), 3.0).count, 0);
    }

    #[test]
    fn warm_up_can_be_disabled() {
        let mut counter = RepCounter::new(ExerciseMode::Pushup).with_warm_up(None);
        assert_eq!(counter.process(&arm_at(85.0), 0.0).feedback, Feedback::Down);
    }

    #[test]
    fn insufficient_pose_degrades_gracefully() {
        let mut counter = RepCounter::new(ExerciseMode::Situp).with_warm_up(None);
        let result = counter.process(&pose_with(&[]), 1.0);
        assert_eq!(result.feedback, Feedback::PoseInsufficient);
        assert_eq!(result.debug, "Need Points");
        assert_eq!(result.count, 0);
    }

    #[test]
    fn set_mode_resets_count() {
        let mut counter = RepCounter::new(ExerciseMode::Pushup).with_warm_up(None);
        for (t, angle) in [170.0, 85.0, 170.0].iter().enumerate() {
            counter.process(&arm_at(*angle), t as f64);
        }
        assert_eq!(counter.count(), 1);

        counter.set_mode(ExerciseMode::Situp);
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.state(), ExerciseState::Rest);
        assert_eq!(counter.mode(), ExerciseMode::Situp);

        counter.set_mode(ExerciseMode::Pushup);
        for (t, angle) in [85.0, 170.0].iter().enumerate() {
            counter.process(&arm_at(*angle), t as f64);
        }
        assert_eq!(counter.count(), 1);
        counter.reset();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn count_never_decreases() {
        let mut counter = RepCounter::new(ExerciseMode::Pushup).with_warm_up(None);
        let mut last = 0;
        let angles = [170.0, 60.0, 30.0, 175.0, 100.0, 80.0, 179.0, 10.0, 165.0, 95.0];
        for (i, angle) in angles.iter().cycle().take(200).enumerate() {
            let result = counter.process(&arm_at(*angle), i as f64 * 0.05);
            assert!(result.count >= last);
            last = result.count;
        }
        assert!(last > 0);
    }

    #[test]
    fn modes_parse_from_cli_strings() {
        assert_eq!("pushup".parse::<ExerciseMode>().unwrap(), ExerciseMode::Pushup);
        assert_eq!("Sit-Up".parse::<ExerciseMode>().unwrap(), ExerciseMode::Situp);
        assert!("squat".parse::<ExerciseMode>().is_err());
    }

    #[test]
    fn feedback_labels() {
        assert_eq!(Feedback::Down.to_string(), "Down ▼");
        assert_eq!(Feedback::NearMiss { best: 63 }.to_string(), "No Count: Best 63°");
        assert_eq!(
            serde_json::to_string(&Feedback::WarmUp { remaining: 2 }).unwrap(),
            "\"Starting in 2...\""
        );
    }
}
