//! Deterministic stand-ins for the media collaborators.

use crate::{
    config::PipelineConfig,
    error::Error,
    exercise::tests::{arm_at, pose_with},
    media::{
        Canvas, Color, EncoderSink, FontWeight, MediaFormat, PoseSource, Rect, TimedFrame,
        VideoSource,
    },
    pose::{Keypoint, KeypointKind::*, Point, Pose},
};
use crossbeam::channel::Sender;
use std::path::{Path, PathBuf};

/// Timeouts short enough to keep tests fast, no render pacing.
pub(crate) fn fast_config() -> PipelineConfig {
    PipelineConfig {
        settle_ms: 0,
        seek_timeout_ms: 20,
        frame_timeout_ms: 20,
        metadata_timeout_ms: 20,
        duration_retry_ms: 0,
        render_fps: 0.0,
        drain_grace_ms: 20,
        poll_interval_ms: 0,
        ..PipelineConfig::default()
    }
}

/// A pose whose nose sits at `(x, y)`.
pub(crate) fn pose_at(x: f32, y: f32, score: f32) -> Pose {
    let mut pose = pose_with(&[(Nose, x, y, 0.9)]);
    pose.score = score;
    pose
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct TestFrame {
    pub(crate) time: f64,
}

impl TimedFrame for TestFrame {
    fn time(&self) -> f64 {
        self.time
    }
}

/// Video whose seeks complete instantly and whose playback clock advances by `playback_step` for
/// every frame read while playing. After a seek, the frame only counts as decoded once
/// `decode_polls` polls of `frame_decoded` have come back false.
#[derive(Debug, Clone)]
pub(crate) struct TestVideo {
    pub(crate) duration: Option<f64>,
    pub(crate) playback_step: f64,
    pub(crate) stuck_seeks: Vec<f64>,
    pub(crate) fail_load: bool,
    pub(crate) loads: Vec<PathBuf>,
    pub(crate) seeks: Vec<f64>,
    pub(crate) muted: bool,
    pub(crate) controls: bool,
    pub(crate) playing: bool,
    pub(crate) releases: usize,
    pub(crate) decode_polls: u32,
    /// Calls to `frame_decoded`.
    pub(crate) polls: usize,
    /// Frames read before the decoder caught up.
    pub(crate) early_reads: usize,
    base: f64,
    played: u32,
    pending: u32,
}

impl TestVideo {
    pub(crate) fn new(duration: Option<f64>) -> Self {
        Self {
            duration,
            playback_step: 0.1,
            stuck_seeks: vec![],
            fail_load: false,
            loads: vec![],
            seeks: vec![],
            muted: false,
            controls: true,
            playing: false,
            releases: 0,
            decode_polls: 0,
            polls: 0,
            early_reads: 0,
            base: 0.0,
            played: 0,
            pending: 0,
        }
    }

    fn end(&self) -> f64 {
        self.duration.unwrap_or(0.0)
    }

    fn is_stuck(&self) -> bool {
        self.stuck_seeks
            .iter()
            .any(|stuck| (stuck - self.base).abs() < 1e-6)
    }
}

impl VideoSource for TestVideo {
    type Frame = TestFrame;

    fn load(&mut self, path: &Path) -> Result<(), Error> {
        if self.fail_load {
            return Err(Error::LoadVideo("unreadable".into(), path.to_owned()));
        }
        self.loads.push(path.to_owned());
        self.base = 0.0;
        self.played = 0;
        Ok(())
    }

    fn metadata_ready(&mut self) -> Result<bool, Error> {
        Ok(true)
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn frame_size(&self) -> (u32, u32) {
        (640, 360)
    }

    fn seek(&mut self, seconds: f64) -> Result<(), Error> {
        self.seeks.push(seconds);
        self.base = seconds;
        self.played = 0;
        self.pending = self.decode_polls;
        Ok(())
    }

    fn seek_completed(&mut self) -> Result<bool, Error> {
        Ok(!self.is_stuck())
    }

    fn frame_decoded(&mut self) -> Result<bool, Error> {
        self.polls += 1;
        if self.pending > 0 {
            self.pending -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn frame(&mut self) -> Result<Self::Frame, Error> {
        if self.pending > 0 {
            self.early_reads += 1;
        }
        let frame = TestFrame {
            time: self.current_time(),
        };
        if self.playing {
            self.played += 1;
        }
        Ok(frame)
    }

    fn play(&mut self) -> Result<(), Error> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        self.playing = false;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        (self.base + f64::from(self.played) * self.playback_step).min(self.end())
    }

    fn ended(&self) -> bool {
        self.current_time() >= self.end()
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_controls(&mut self, enabled: bool) {
        self.controls = enabled;
    }

    fn release(&mut self) {
        self.releases += 1;
        self.playing = false;
    }
}

/// Poses computed from the frame time.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedPoses {
    script: fn(f64) -> Vec<Pose>,
    failing: Vec<f64>,
    pub(crate) fail_init: bool,
    pub(crate) inits: usize,
}

impl ScriptedPoses {
    fn scripted(script: fn(f64) -> Vec<Pose>) -> Self {
        Self {
            script,
            failing: vec![],
            fail_init: false,
            inits: 0,
        }
    }

    /// Nobody in frame.
    pub(crate) fn empty() -> Self {
        Self::scripted(|_| vec![])
    }

    /// One pushup every 1.5 s: arm extended, bent from 0.5 s, extended again from 1.0 s. A second,
    /// distracting subject stands to the left.
    pub(crate) fn pushups() -> Self {
        Self::scripted(|time| {
            let phase = time % 1.5;
            let angle = if (0.5..1.0).contains(&phase) { 80.0 } else { 170.0 };
            let mut subject = arm_at(angle);
            subject.keypoints[Nose.idx()] = Keypoint::new(Nose, Point::new(400.0, 50.0), 0.9);
            subject.keypoints[LeftAnkle.idx()] =
                Keypoint::new(LeftAnkle, Point::new(90.0, 300.0), 0.05);
            vec![pose_at(100.0, 50.0, 0.9), subject]
        })
    }

    /// Make estimation fail for frames at these times.
    pub(crate) fn failing_at(mut self, times: &[f64]) -> Self {
        self.failing = times.to_vec();
        self
    }
}

impl PoseSource<TestFrame> for ScriptedPoses {
    fn init(&mut self) -> Result<(), Error> {
        self.inits += 1;
        if self.fail_init {
            Err(Error::InitializePoseSource("model missing".into()))
        } else {
            Ok(())
        }
    }

    fn estimate(&mut self, frame: &TestFrame) -> Result<Vec<Pose>, Error> {
        if self
            .failing
            .iter()
            .any(|time| (time - frame.time).abs() < 1e-6)
        {
            return Err(Error::EstimatePoses("inference failed".into()));
        }
        Ok((self.script)(frame.time))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DrawOp {
    Clear,
    Frame(f64),
    Circle {
        center: Point,
        radius: f32,
        color: Color,
        filled: bool,
    },
    Line {
        from: Point,
        to: Point,
        color: Color,
        thickness: f32,
    },
    RoundedRect {
        rect: Rect,
        radius: f32,
        color: Color,
    },
    Text {
        text: String,
        origin: Point,
        size: f32,
        weight: FontWeight,
        color: Color,
    },
}

/// Canvas that remembers every call since it was last cleared.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingCanvas {
    pub(crate) ops: Vec<DrawOp>,
    pub(crate) clears: usize,
    /// Every text drawn, across clears.
    pub(crate) history: Vec<String>,
}

impl RecordingCanvas {
    pub(crate) fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn lines(&self) -> Vec<(Point, Point, Color)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Line { from, to, color, .. } => Some((*from, *to, *color)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn filled_circles(&self) -> Vec<Point> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Circle {
                    center,
                    filled: true,
                    ..
                } => Some(*center),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn outlines(&self) -> Vec<Color> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Circle {
                    color,
                    filled: false,
                    ..
                } => Some(*color),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    type Frame = TestFrame;

    fn size(&self) -> (u32, u32) {
        (1280, 720)
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.clears += 1;
        self.ops = vec![DrawOp::Clear];
        Ok(())
    }

    fn draw_frame(&mut self, frame: &Self::Frame) -> Result<(), Error> {
        self.ops.push(DrawOp::Frame(frame.time));
        Ok(())
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) -> Result<(), Error> {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color,
            filled: true,
        });
        Ok(())
    }

    fn stroke_circle(
        &mut self,
        center: Point,
        radius: f32,
        color: Color,
        _thickness: f32,
    ) -> Result<(), Error> {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color,
            filled: false,
        });
        Ok(())
    }

    fn line(&mut self, from: Point, to: Point, color: Color, thickness: f32) -> Result<(), Error> {
        self.ops.push(DrawOp::Line {
            from,
            to,
            color,
            thickness,
        });
        Ok(())
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color) -> Result<(), Error> {
        self.ops.push(DrawOp::RoundedRect {
            rect,
            radius,
            color,
        });
        Ok(())
    }

    fn text(
        &mut self,
        text: &str,
        origin: Point,
        size: f32,
        weight: FontWeight,
        color: Color,
    ) -> Result<(), Error> {
        self.history.push(text.to_owned());
        self.ops.push(DrawOp::Text {
            text: text.to_owned(),
            origin,
            size,
            weight,
            color,
        });
        Ok(())
    }
}

/// Encoder that emits one single-byte chunk per capture and a trailer on stop.
#[derive(Debug)]
pub(crate) struct MemoryEncoder {
    supported: Vec<MediaFormat>,
    chunks: Option<Sender<Vec<u8>>>,
    sent: Vec<u8>,
    recording: bool,
    silent: bool,
    hold_open: bool,
    pub(crate) started: Vec<MediaFormat>,
    pub(crate) captures: usize,
    pub(crate) stops: usize,
}

const TRAILER: u8 = 0xff;

impl Default for MemoryEncoder {
    fn default() -> Self {
        Self::supporting(&[MediaFormat::WEBM_VP9, MediaFormat::WEBM])
    }
}

impl MemoryEncoder {
    pub(crate) fn supporting(formats: &[MediaFormat]) -> Self {
        Self {
            supported: formats.to_vec(),
            chunks: None,
            sent: vec![],
            recording: false,
            silent: false,
            hold_open: false,
            started: vec![],
            captures: 0,
            stops: 0,
        }
    }

    /// Emits nothing at all.
    pub(crate) fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    /// Never closes its chunk channel.
    pub(crate) fn held_open() -> Self {
        Self {
            hold_open: true,
            ..Self::default()
        }
    }

    /// Every byte sent during the latest session, in order.
    pub(crate) fn expected_bytes(&self) -> Vec<u8> {
        self.sent.clone()
    }

    fn send(&mut self, chunk: Vec<u8>) {
        if self.silent {
            return;
        }
        if let Some(chunks) = self.chunks.as_ref() {
            self.sent.extend_from_slice(&chunk);
            // the receiver may already be gone after a cancelled run
            let _ = chunks.send(chunk);
        }
    }
}

impl EncoderSink<RecordingCanvas> for MemoryEncoder {
    fn supports(&self, format: &MediaFormat) -> bool {
        self.supported.contains(format)
    }

    fn start(&mut self, format: &MediaFormat, chunks: Sender<Vec<u8>>) -> Result<(), Error> {
        self.started.push(*format);
        self.sent.clear();
        self.chunks = Some(chunks);
        self.recording = true;
        Ok(())
    }

    fn capture(&mut self, _canvas: &RecordingCanvas) -> Result<(), Error> {
        let byte = (self.captures % 0xff) as u8;
        self.captures += 1;
        self.send(vec![byte]);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.stops += 1;
        self.recording = false;
        self.send(vec![TRAILER]);
        if self.hold_open {
            return Ok(());
        }
        self.chunks = None;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }
}
