//! Seams to the outside world: where frames come from, who finds people in them, what they are
//! drawn on and where the drawing is encoded to.

use crate::{
    error::Error,
    pose::{Point, Pose},
};
use crossbeam::channel::Sender;
use std::path::Path;

/// Stem of the downloadable output file name.
pub const OUTPUT_FILE_STEM: &str = "rok-fit-analyzed";

/// Source of decoded video frames with a seekable position and a playback clock.
pub trait VideoSource {
    type Frame;

    fn load(&mut self, path: &Path) -> Result<(), Error>;

    /// Whether duration and dimensions are known.
    fn metadata_ready(&mut self) -> Result<bool, Error>;

    /// Length in seconds, `None` while unknown.
    fn duration(&self) -> Option<f64>;

    /// `(width, height)` of decoded frames.
    fn frame_size(&self) -> (u32, u32);

    /// Start moving the read position to `seconds`.
    fn seek(&mut self, seconds: f64) -> Result<(), Error>;

    /// Whether the most recent seek has completed.
    fn seek_completed(&mut self) -> Result<bool, Error>;

    /// Whether a frame for the current position has been decoded.
    fn frame_decoded(&mut self) -> Result<bool, Error>;

    /// The frame at the current position.
    fn frame(&mut self) -> Result<Self::Frame, Error>;

    fn play(&mut self) -> Result<(), Error>;

    fn pause(&mut self) -> Result<(), Error>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Whether playback has run off the end.
    fn ended(&self) -> bool;

    fn set_muted(&mut self, muted: bool);

    fn set_controls(&mut self, enabled: bool);

    /// Drop the loaded video. Safe to call repeatedly.
    fn release(&mut self);
}

/// Frames that know where in the video they were taken.
pub trait TimedFrame {
    fn time(&self) -> f64;
}

/// Pose estimator. Treated as a black box.
pub trait PoseSource<F> {
    /// Load the model. Failing here is fatal for the whole run.
    fn init(&mut self) -> Result<(), Error>;

    /// Find every subject in `frame`. Failures are transient and only lose one sample.
    fn estimate(&mut self, frame: &F) -> Result<Vec<Pose>, Error>;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Drawing surface the encoder captures from.
pub trait Canvas {
    type Frame;

    fn size(&self) -> (u32, u32);

    fn clear(&mut self) -> Result<(), Error>;

    /// Paint `frame` scaled to cover the whole canvas.
    fn draw_frame(&mut self, frame: &Self::Frame) -> Result<(), Error>;

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) -> Result<(), Error>;

    fn stroke_circle(
        &mut self,
        center: Point,
        radius: f32,
        color: Color,
        thickness: f32,
    ) -> Result<(), Error>;

    fn line(&mut self, from: Point, to: Point, color: Color, thickness: f32) -> Result<(), Error>;

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color) -> Result<(), Error>;

    /// Draw `text` with its baseline starting at `origin`; `size` is the font height in pixels.
    fn text(
        &mut self,
        text: &str,
        origin: Point,
        size: f32,
        weight: FontWeight,
        color: Color,
    ) -> Result<(), Error>;
}

/// Container and codec of the encoded output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MediaFormat {
    pub mime_type: &'static str,
    pub extension: &'static str,
    pub fourcc: [char; 4],
}

impl MediaFormat {
    pub const WEBM_VP9: Self = Self {
        mime_type: "video/webm; codecs=vp9",
        extension: "webm",
        fourcc: ['V', 'P', '9', '0'],
    };

    pub const WEBM: Self = Self {
        mime_type: "video/webm",
        extension: "webm",
        fourcc: ['V', 'P', '8', '0'],
    };

    /// Media type of the assembled stream, without codec parameters.
    pub fn container_type(&self) -> &'static str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or(self.mime_type)
            .trim()
    }
}

/// Records a canvas into an encoded stream.
pub trait EncoderSink<C> {
    fn supports(&self, format: &MediaFormat) -> bool;

    /// Begin a session. Encoded chunks are sent on `chunks`; the sink drops the sender once
    /// everything it buffered has been flushed after [`EncoderSink::stop`].
    fn start(&mut self, format: &MediaFormat, chunks: Sender<Vec<u8>>) -> Result<(), Error>;

    /// Grab the current state of `canvas`.
    fn capture(&mut self, canvas: &C) -> Result<(), Error>;

    fn stop(&mut self) -> Result<(), Error>;

    fn is_recording(&self) -> bool;
}

/// The finished, playable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVideo {
    pub media_type: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl EncodedVideo {
    pub fn file_name(&self) -> String {
        format!("{}.{}", OUTPUT_FILE_STEM, self.extension)
    }
}
