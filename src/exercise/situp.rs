use super::{joint_angle, select_side, usable, Exercise, ExerciseState, Feedback, Tally};
use crate::pose::Pose;

/// Elbow-hip-knee angle below which the torso counts as fully raised.
const UP_DEGREES: f32 = 50.0;
/// Best angle below which a missed rep is reported as a near miss.
const NEAR_MISS_DEGREES: f32 = 80.0;
/// Vertical share of the torso below which the body counts as lying flat.
const FLAT_RATIO: f32 = 0.6;
/// Minimum number of seconds between two counted reps.
const MIN_REP_GAP: f64 = 0.4;
/// Torso lengths are floored to this many pixels.
const MIN_TORSO_LENGTH: f32 = 1.0;
const NO_ANGLE: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SitupFeatures {
    /// Elbow-hip-knee angle in degrees.
    pub angle: f32,
    /// |Δy(shoulder, hip)| / torso length.
    pub flatness: f32,
}

#[derive(Debug, Clone)]
pub struct Situp {
    last_count: Option<f64>,
    min_angle: f32,
}

impl Default for Situp {
    fn default() -> Self {
        Self {
            last_count: None,
            min_angle: NO_ANGLE,
        }
    }
}

impl Situp {
    fn debounced(&self, timestamp: f64) -> bool {
        self.last_count
            .map_or(true, |last| timestamp - last > MIN_REP_GAP)
    }
}

impl Exercise for Situp {
    type Features = SitupFeatures;

    fn extract(&self, pose: &Pose) -> Option<SitupFeatures> {
        let side = select_side(pose, |s| [s.hip, s.knee, s.elbow], 0.0)?;
        let shoulder = usable(pose, side.shoulder)?;
        let hip = usable(pose, side.hip)?;
        let knee = usable(pose, side.knee)?;
        let elbow = usable(pose, side.elbow)?;

        let torso = shoulder.distance(hip).max(MIN_TORSO_LENGTH);
        Some(SitupFeatures {
            angle: joint_angle(elbow, hip, knee),
            flatness: (shoulder.y - hip.y).abs() / torso,
        })
    }

    fn describe(features: &SitupFeatures) -> String {
        format!(
            "Ang:{} | Flat:{:.2}",
            features.angle.round(),
            features.flatness
        )
    }

    fn transition(&mut self, features: &SitupFeatures, timestamp: f64, tally: &mut Tally) {
        let &SitupFeatures { angle, flatness } = features;
        self.min_angle = self.min_angle.min(angle);

        if flatness < FLAT_RATIO {
            if tally.state == ExerciseState::Counted {
                tally.feedback = Feedback::SitupReset;
            } else if self.min_angle > UP_DEGREES && self.min_angle < NEAR_MISS_DEGREES {
                tally.feedback = Feedback::NearMiss {
                    best: self.min_angle.round() as u32,
                };
            } else {
                tally.feedback = Feedback::Ready;
            }
            tally.state = ExerciseState::Rest;
            self.min_angle = NO_ANGLE;
        } else if angle < UP_DEGREES {
            if tally.state == ExerciseState::Counted {
                tally.feedback = Feedback::DownNow;
            } else if self.debounced(timestamp) {
                tally.count += 1;
                tally.state = ExerciseState::Counted;
                tally.feedback = Feedback::SitupCounted;
                self.last_count = Some(timestamp);
            }
        } else if tally.state == ExerciseState::Rest {
            tally.state = ExerciseState::ActionEntered;
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
