//! The real-time pass: replay the video, draw the recorded annotations over it and capture the
//! canvas into an encoder.

use crate::{
    config::PipelineConfig,
    error::Error,
    generation::Generation,
    media::{Canvas, EncodedVideo, EncoderSink, MediaFormat, VideoSource},
    render::Overlay,
    track::AnnotationTrack,
};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// Formats in order of preference. The last one is the default every encoder is expected to take.
const PREFERRED_FORMATS: [MediaFormat; 2] = [MediaFormat::WEBM_VP9, MediaFormat::WEBM];

/// First preferred format the encoder accepts.
pub(crate) fn negotiate<C, E>(encoder: &E) -> Result<MediaFormat, Error>
where
    E: EncoderSink<C>,
{
    let [preferred, fallback] = PREFERRED_FORMATS;
    if encoder.supports(&preferred) {
        Ok(preferred)
    } else if encoder.supports(&fallback) {
        info!(
            message = "preferred format unsupported, falling back",
            preferred = preferred.mime_type,
            fallback = fallback.mime_type
        );
        Ok(fallback)
    } else {
        Err(Error::UnsupportedFormat(preferred.mime_type, fallback.mime_type))
    }
}

pub struct EncodingPhase<'a> {
    config: &'a PipelineConfig,
    generation: &'a Generation,
}

impl<'a> EncodingPhase<'a> {
    pub fn new(config: &'a PipelineConfig, generation: &'a Generation) -> Self {
        Self { config, generation }
    }

    /// Play the video once from the start, rendering every tick with the track entry nearest to the
    /// playback position, and return the assembled encoder output.
    ///
    /// If the run fails or is superseded the encoder is stopped and its chunks are discarded.
    #[instrument(name = "EncodingPhase::run", skip_all, level = "debug", fields(generation = self.generation.id()))]
    pub fn run<V, C, E>(
        &self,
        video: &mut V,
        canvas: &mut C,
        encoder: &mut E,
        track: &AnnotationTrack,
        progress: &mut dyn FnMut(f64),
    ) -> Result<EncodedVideo, Error>
    where
        V: VideoSource,
        C: Canvas<Frame = V::Frame>,
        E: EncoderSink<C>,
    {
        if track.is_empty() {
            return Err(Error::EmptyTrack);
        }

        let format = negotiate(encoder)?;
        let (sender, chunks) = channel::unbounded();
        encoder.start(&format, sender)?;
        info!(message = "encoding", format = format.mime_type, entries = track.len());

        if let Err(error) = self.record(video, canvas, encoder, track, progress) {
            if encoder.is_recording() {
                if let Err(stop_error) = encoder.stop() {
                    warn!(message = "failed to stop encoder", error = %stop_error);
                }
            }
            // dropping the receiver discards whatever was captured
            return Err(error);
        }

        encoder.stop()?;
        let bytes = self.drain(&chunks);
        self.generation.check()?;

        if bytes.is_empty() {
            return Err(Error::EmptyOutput);
        }

        info!(message = "encoding finished", bytes = bytes.len());
        Ok(EncodedVideo {
            media_type: format.container_type().to_owned(),
            extension: format.extension,
            bytes,
        })
    }

    fn record<V, C, E>(
        &self,
        video: &mut V,
        canvas: &mut C,
        encoder: &mut E,
        track: &AnnotationTrack,
        progress: &mut dyn FnMut(f64),
    ) -> Result<(), Error>
    where
        V: VideoSource,
        C: Canvas<Frame = V::Frame>,
        E: EncoderSink<C>,
    {
        let poll = self.config.poll_interval();
        let interval = self.config.render_interval();

        video.set_muted(true);
        video.set_controls(false);

        video.seek(0.0)?;
        let seek_timeout = self.config.seek_timeout();
        if !self
            .generation
            .wait_until(seek_timeout, poll, || video.seek_completed())?
        {
            warn!(message = "rewind did not complete, playing from current position", timeout = ?seek_timeout);
        }

        // the track's last sample bounds the progress denominator when the duration is unknown
        let duration = video
            .duration()
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .unwrap_or_else(|| (track.len() - 1) as f64 * track.step());

        let overlay = Overlay::new(track.mode(), self.config.draw_threshold);
        video.play()?;

        let mut ticks = 0_u64;
        loop {
            self.generation.check()?;
            if video.ended() {
                break;
            }

            let time = video.current_time();
            let frame = video.frame()?;
            overlay.render(canvas, &frame, video.frame_size(), track.entry_at(time))?;
            encoder.capture(canvas)?;
            trace!(time, index = ?track.index_at(time));

            progress(if duration > 0.0 {
                (time / duration * 100.0).clamp(0.0, 100.0)
            } else {
                100.0
            });
            ticks += 1;

            self.generation.sleep(interval, poll)?;
        }

        video.pause()?;
        progress(100.0);
        debug!(message = "playback ended", ticks);
        Ok(())
    }

    /// Collect chunks until the encoder hangs up or the grace period runs out.
    fn drain(&self, chunks: &Receiver<Vec<u8>>) -> Vec<u8> {
        let deadline = Instant::now() + self.config.drain_grace();
        let mut bytes = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match chunks.recv_timeout(remaining) {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        message = "encoder still open after grace period, using what arrived",
                        grace = ?self.config.drain_grace()
                    );
                    break;
                }
            }
        }
        bytes
    }
}
