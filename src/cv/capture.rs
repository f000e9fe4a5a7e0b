use crate::{
    error::Error,
    media::{TimedFrame, VideoSource},
};
use num_traits::ToPrimitive;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES, CAP_PROP_POS_MSEC,
    },
};
use std::{path::Path, time::Instant};
use tracing::{debug, info, warn};

/// A decoded frame and the media time it was taken at.
#[derive(Debug)]
pub struct VideoFrame {
    pub mat: Mat,
    pub time: f64,
}

impl TimedFrame for VideoFrame {
    fn time(&self) -> f64 {
        self.time
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Metadata {
    fps: f64,
    frame_count: f64,
    width: u32,
    height: u32,
}

/// [`VideoSource`] over a video file.
///
/// Playback is modelled on the wall clock: while playing, every call to `frame` grabs forward to
/// the frame due at the current clock position, so slow consumers skip frames instead of drifting.
pub struct CaptureVideo {
    capture: Option<VideoCapture>,
    metadata: Metadata,
    current: Mat,
    decoded: bool,
    /// Index of the frame the next grab returns.
    next_index: i64,
    position: f64,
    playing_since: Option<(Instant, f64)>,
    exhausted: bool,
    muted: bool,
    controls: bool,
}

impl Default for CaptureVideo {
    fn default() -> Self {
        Self {
            capture: None,
            metadata: Metadata::default(),
            current: Mat::default(),
            decoded: false,
            next_index: 0,
            position: 0.0,
            playing_since: None,
            exhausted: false,
            muted: false,
            controls: true,
        }
    }
}

impl CaptureVideo {
    pub fn new() -> Self {
        Self::default()
    }

    fn capture(&mut self) -> Result<&mut VideoCapture, Error> {
        self.capture
            .as_mut()
            .ok_or_else(|| Error::Playback("no video loaded".into()))
    }

    /// Grab forward to the frame due at `time` and decode it.
    fn advance_to(&mut self, time: f64) -> Result<(), Error> {
        let due = (time * self.metadata.fps)
            .floor()
            .to_i64()
            .ok_or(Error::ConvertToUSize)?;
        let mut grabbed = false;
        while self.next_index <= due {
            let capture = self.capture()?;
            if !capture
                .grab()
                .map_err(|e| Error::ReadFrame(Box::new(e)))?
            {
                self.exhausted = true;
                break;
            }
            self.next_index += 1;
            grabbed = true;
        }

        if grabbed {
            let mut mat = Mat::default();
            let retrieved = self
                .capture()?
                .retrieve(&mut mat, 0)
                .map_err(|e| Error::ReadFrame(Box::new(e)))?;
            if retrieved && !mat.empty() {
                self.current = mat;
                self.decoded = true;
            }
        }
        self.position = time;
        Ok(())
    }
}

impl VideoSource for CaptureVideo {
    type Frame = VideoFrame;

    fn load(&mut self, path: &Path) -> Result<(), Error> {
        self.release();

        let name = path
            .to_str()
            .ok_or_else(|| Error::OpenCapture(path.display().to_string()))?;
        let capture = VideoCapture::from_file(name, CAP_ANY)
            .map_err(|e| Error::LoadVideo(Box::new(e), path.to_owned()))?;
        if !capture.is_opened().map_err(Error::OpenCv)? {
            return Err(Error::OpenCapture(path.display().to_string()));
        }

        self.metadata = Metadata {
            fps: capture.get(CAP_PROP_FPS).map_err(Error::OpenCv)?,
            frame_count: capture.get(CAP_PROP_FRAME_COUNT).map_err(Error::OpenCv)?,
            width: capture
                .get(CAP_PROP_FRAME_WIDTH)
                .map_err(Error::OpenCv)?
                .to_u32()
                .unwrap_or_default(),
            height: capture
                .get(CAP_PROP_FRAME_HEIGHT)
                .map_err(Error::OpenCv)?
                .to_u32()
                .unwrap_or_default(),
        };
        info!(
            message = "opened video",
            path = %path.display(),
            fps = self.metadata.fps,
            frames = self.metadata.frame_count,
            width = self.metadata.width,
            height = self.metadata.height
        );

        self.capture = Some(capture);
        Ok(())
    }

    fn metadata_ready(&mut self) -> Result<bool, Error> {
        Ok(self.capture.is_some() && self.metadata.fps > 0.0)
    }

    fn duration(&self) -> Option<f64> {
        let Metadata {
            fps, frame_count, ..
        } = self.metadata;
        if fps > 0.0 && frame_count > 0.0 {
            Some(frame_count / fps)
        } else {
            None
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.metadata.width, self.metadata.height)
    }

    fn seek(&mut self, seconds: f64) -> Result<(), Error> {
        let capture = self.capture()?;
        capture
            .set(CAP_PROP_POS_MSEC, seconds * 1000.0)
            .map_err(|e| Error::Seek(Box::new(e), seconds))?;
        let next_index = capture
            .get(CAP_PROP_POS_FRAMES)
            .map_err(|e| Error::Seek(Box::new(e), seconds))?;

        self.next_index = next_index.to_i64().unwrap_or_default();
        self.position = seconds;
        self.decoded = false;
        self.exhausted = false;
        if self.playing_since.is_some() {
            self.playing_since = Some((Instant::now(), seconds));
        }
        Ok(())
    }

    fn seek_completed(&mut self) -> Result<bool, Error> {
        // seeking a capture is synchronous
        Ok(self.capture.is_some())
    }

    fn frame_decoded(&mut self) -> Result<bool, Error> {
        if !self.decoded && !self.exhausted {
            let mut mat = Mat::default();
            let read = self
                .capture()?
                .read(&mut mat)
                .map_err(|e| Error::ReadFrame(Box::new(e)))?;
            if read && !mat.empty() {
                self.current = mat;
                self.decoded = true;
                self.next_index += 1;
            } else {
                debug!(message = "no frame at position", position = self.position);
                self.exhausted = true;
            }
        }
        Ok(self.decoded)
    }

    fn frame(&mut self) -> Result<Self::Frame, Error> {
        if self.playing_since.is_some() {
            let time = self.current_time();
            self.advance_to(time)?;
        }
        if !self.decoded {
            return Err(Error::ReadFrame(
                format!("no frame decoded at {:.3}s", self.position).into(),
            ));
        }
        Ok(VideoFrame {
            mat: self.current.try_clone().map_err(Error::OpenCv)?,
            time: self.position,
        })
    }

    fn play(&mut self) -> Result<(), Error> {
        self.capture()?;
        if self.playing_since.is_none() {
            self.playing_since = Some((Instant::now(), self.position));
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        if self.playing_since.is_some() {
            self.position = self.current_time();
            self.playing_since = None;
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        let time = match self.playing_since {
            Some((since, from)) => from + since.elapsed().as_secs_f64(),
            None => self.position,
        };
        self.duration().map_or(time, |duration| time.min(duration))
    }

    fn ended(&self) -> bool {
        self.playing_since.is_some()
            && (self.exhausted
                || self
                    .duration()
                    .map_or(false, |duration| self.current_time() >= duration))
    }

    fn set_muted(&mut self, muted: bool) {
        // captures decode no audio
        self.muted = muted;
    }

    fn set_controls(&mut self, enabled: bool) {
        self.controls = enabled;
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!(message = "failed to release capture", error = %e);
            }
        }
        let (muted, controls) = (self.muted, self.controls);
        *self = Self {
            muted,
            controls,
            ..Self::default()
        };
    }
}
