use crate::track::DEFAULT_STEP;
use std::time::Duration;

/// Tuning knobs for both pipeline phases.
#[derive(Debug, Clone, PartialEq, structopt::StructOpt)]
pub struct PipelineConfig {
    /// Seconds between analysis samples.
    #[structopt(long, default_value = "0.05")]
    pub step: f64,

    /// Milliseconds to let the decoder settle after a seek before reading the frame.
    #[structopt(long, default_value = "50")]
    pub settle_ms: u64,

    /// Milliseconds to wait for a seek to complete before giving up on the sample.
    #[structopt(long, default_value = "2000")]
    pub seek_timeout_ms: u64,

    /// Milliseconds to wait for a decoded frame after settling.
    #[structopt(long, default_value = "250")]
    pub frame_timeout_ms: u64,

    /// Milliseconds to wait for video metadata after loading.
    #[structopt(long, default_value = "5000")]
    pub metadata_timeout_ms: u64,

    /// Milliseconds to wait once for an unknown duration to become known.
    #[structopt(long, default_value = "500")]
    pub duration_retry_ms: u64,

    /// Seconds analyzed when the duration stays unknown.
    #[structopt(long, default_value = "600")]
    pub max_duration: f64,

    /// Render ticks per second while encoding.
    #[structopt(long, default_value = "30")]
    pub render_fps: f64,

    /// Milliseconds to keep draining encoder chunks after stopping it.
    #[structopt(long, default_value = "500")]
    pub drain_grace_ms: u64,

    /// Poses scoring at or below this are ignored.
    #[structopt(long, default_value = "0.1")]
    pub min_pose_score: f32,

    /// Keypoints scoring at or below this are not drawn.
    #[structopt(long, default_value = "0.3")]
    pub draw_threshold: f32,

    /// Seconds at the start of the video during which nothing is counted. 0 disables.
    #[structopt(long, default_value = "3")]
    pub warm_up: f64,

    /// Milliseconds between polls of a readiness condition.
    #[structopt(long, default_value = "5")]
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            settle_ms: 50,
            seek_timeout_ms: 2000,
            frame_timeout_ms: 250,
            metadata_timeout_ms: 5000,
            duration_retry_ms: 500,
            max_duration: 600.0,
            render_fps: 30.0,
            drain_grace_ms: 500,
            min_pose_score: 0.1,
            draw_threshold: 0.3,
            warm_up: crate::exercise::WARM_UP_SECONDS,
            poll_interval_ms: 5,
        }
    }
}

impl PipelineConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn duration_retry(&self) -> Duration {
        Duration::from_millis(self.duration_retry_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Time between render ticks.
    pub fn render_interval(&self) -> Duration {
        if self.render_fps.is_finite() && self.render_fps > 0.0 {
            Duration::from_secs_f64(self.render_fps.recip())
        } else {
            Duration::ZERO
        }
    }

    pub fn warm_up(&self) -> Option<f64> {
        Some(self.warm_up).filter(|seconds| *seconds > 0.0)
    }
}
