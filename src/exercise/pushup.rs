use super::{joint_angle, select_side, usable, Exercise, ExerciseState, Feedback, Tally};
use crate::pose::Pose;

/// Elbow angle at or below which the body counts as lowered.
const DOWN_DEGREES: f32 = 90.0;
/// Elbow angle at or above which a lowered body counts as a completed rep.
const UP_DEGREES: f32 = 160.0;
/// Minimum summed confidence of shoulder, elbow and wrist on the chosen side.
const MIN_ARM_SCORE: f32 = 0.9;

/// Counts push-ups from the elbow angle. The gap between [`DOWN_DEGREES`] and [`UP_DEGREES`]
/// keeps a single noisy crossing from counting twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pushup;

impl Exercise for Pushup {
    type Features = f32;

    fn extract(&self, pose: &Pose) -> Option<f32> {
        let side = select_side(pose, |s| [s.shoulder, s.elbow, s.wrist], MIN_ARM_SCORE)?;
        let shoulder = usable(pose, side.shoulder)?;
        let elbow = usable(pose, side.elbow)?;
        let wrist = usable(pose, side.wrist)?;
        Some(joint_angle(shoulder, elbow, wrist))
    }

    fn describe(angle: &f32) -> String {
        format!("Angle: {}°", angle.round())
    }

    fn transition(&mut self, &angle: &f32, _timestamp: f64, tally: &mut Tally) {
        if angle <= DOWN_DEGREES {
            if tally.state != ExerciseState::ActionEntered {
                tally.state = ExerciseState::ActionEntered;
                tally.feedback = Feedback::Down;
            }
        } else if angle >= UP_DEGREES && tally.state == ExerciseState::ActionEntered {
            tally.count += 1;
            tally.state = ExerciseState::Counted;
            tally.feedback = Feedback::Up;
        }
    }

    fn reset(&mut self) {}
}
