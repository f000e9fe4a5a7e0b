//! Burning annotations into frames: skeleton, keypoints and the count HUD.

use crate::{
    error::Error,
    exercise::{CountResult, ExerciseMode},
    media::{Canvas, Color, FontWeight, Rect},
    pose::{constants::SKELETON_EDGES, KeypointKind, Point, Pose},
    track::AnnotationEntry,
};

const LINE_WIDTH: f32 = 4.0;
const KEYPOINT_RADIUS: f32 = 6.0;
const OUTLINE_WIDTH: f32 = 2.0;

const HUD_BOX: Rect = Rect {
    x: 20.0,
    y: 20.0,
    width: 250.0,
    height: 100.0,
};
const HUD_RADIUS: f32 = 16.0;
const HUD_FILL: Color = Color::rgba(0, 0, 0, 0.4);
const COUNT_ORIGIN: Point = Point::new(40.0, 75.0);
const COUNT_SIZE: f32 = 48.0;
const COUNT_COLOR: Color = Color::rgb(0x4a, 0xde, 0x80);
const FEEDBACK_ORIGIN: Point = Point::new(40.0, 105.0);
const FEEDBACK_SIZE: f32 = 20.0;

/// Colors of one exercise mode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Style {
    pub skeleton: Color,
    /// Outline of the joints the mode measures.
    pub tracked: Color,
    /// Outline of every other joint.
    pub untracked: Color,
}

impl Style {
    pub fn for_mode(mode: ExerciseMode) -> Self {
        let teal = Color::rgb(0x00, 0xad, 0xb5);
        match mode {
            ExerciseMode::Pushup => Self {
                skeleton: teal,
                tracked: Color::rgb(0x00, 0xff, 0x88),
                untracked: teal,
            },
            ExerciseMode::Situp => Self {
                skeleton: Color::rgb(0xff, 0x4d, 0x4d),
                tracked: Color::rgb(0xff, 0x4d, 0x4d),
                untracked: teal,
            },
        }
    }
}

/// Draws one annotated frame.
#[derive(Debug, Clone)]
pub struct Overlay {
    mode: ExerciseMode,
    style: Style,
    draw_threshold: f32,
}

impl Overlay {
    pub fn new(mode: ExerciseMode, draw_threshold: f32) -> Self {
        Self {
            mode,
            style: Style::for_mode(mode),
            draw_threshold,
        }
    }

    /// Paint `frame` over the whole canvas, then the pose and HUD of `entry` if there is one.
    /// Poses are in `frame_size` coordinates and get scaled to the canvas.
    pub fn render<C>(
        &self,
        canvas: &mut C,
        frame: &C::Frame,
        frame_size: (u32, u32),
        entry: Option<&AnnotationEntry>,
    ) -> Result<(), Error>
    where
        C: Canvas,
    {
        canvas.clear()?;
        canvas.draw_frame(frame)?;

        let entry = match entry {
            Some(entry) => entry,
            None => return Ok(()),
        };

        if let Some(pose) = entry.pose.as_ref() {
            let scale = scale(frame_size, canvas.size());
            self.skeleton(canvas, pose, scale)?;
            self.keypoints(canvas, pose, scale)?;
            if let Some(result) = entry.result.as_ref() {
                hud(canvas, result)?;
            }
        }
        Ok(())
    }

    fn visible(&self, pose: &Pose, kind: KeypointKind) -> Option<Point> {
        pose.get(kind)
            .filter(|keypoint| keypoint.score > self.draw_threshold)
            .map(|keypoint| keypoint.point)
    }

    fn skeleton<C>(&self, canvas: &mut C, pose: &Pose, scale: (f32, f32)) -> Result<(), Error>
    where
        C: Canvas,
    {
        for &(a, b) in SKELETON_EDGES.iter() {
            if let (Some(from), Some(to)) = (self.visible(pose, a), self.visible(pose, b)) {
                canvas.line(from * scale, to * scale, self.style.skeleton, LINE_WIDTH)?;
            }
        }
        Ok(())
    }

    fn keypoints<C>(&self, canvas: &mut C, pose: &Pose, scale: (f32, f32)) -> Result<(), Error>
    where
        C: Canvas,
    {
        let tracked = self.mode.tracked_joints();
        for keypoint in pose.keypoints.iter() {
            let kind = match keypoint.kind {
                Some(kind) if keypoint.score > self.draw_threshold => kind,
                _ => continue,
            };
            let center = keypoint.point * scale;
            let outline = if tracked.contains(&kind) {
                self.style.tracked
            } else {
                self.style.untracked
            };
            canvas.fill_circle(center, KEYPOINT_RADIUS, Color::WHITE)?;
            canvas.stroke_circle(center, KEYPOINT_RADIUS, outline, OUTLINE_WIDTH)?;
        }
        Ok(())
    }
}

fn hud<C>(canvas: &mut C, result: &CountResult) -> Result<(), Error>
where
    C: Canvas,
{
    canvas.fill_rounded_rect(HUD_BOX, HUD_RADIUS, HUD_FILL)?;
    canvas.text(
        &result.count.to_string(),
        COUNT_ORIGIN,
        COUNT_SIZE,
        FontWeight::Bold,
        COUNT_COLOR,
    )?;
    canvas.text(
        &result.feedback.to_string(),
        FEEDBACK_ORIGIN,
        FEEDBACK_SIZE,
        FontWeight::Regular,
        Color::WHITE,
    )
}

/// Factors mapping video coordinates onto the canvas. Unknown frame dimensions map 1:1.
fn scale((frame_width, frame_height): (u32, u32), (width, height): (u32, u32)) -> (f32, f32) {
    let axis = |canvas: u32, frame: u32| {
        if frame == 0 {
            1.0
        } else {
            canvas as f32 / frame as f32
        }
    };
    (axis(width, frame_width), axis(height, frame_height))
}
