use std::{path::PathBuf, time::Duration};

/// Boxed error produced by an external collaborator (pose model, decoder, encoder).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to initialize pose source")]
    InitializePoseSource(#[source] BoxError),

    #[error("failed to estimate poses")]
    EstimatePoses(#[source] BoxError),

    #[error("failed to load video: {1:?}")]
    LoadVideo(#[source] BoxError, PathBuf),

    #[error("video metadata not ready after {0:?}")]
    MetadataTimeout(Duration),

    #[error("failed to seek to {1:.3}s")]
    Seek(#[source] BoxError, f64),

    #[error("seek to {0:.3}s did not complete within {1:?}")]
    SeekTimeout(f64, Duration),

    #[error("no decoded frame at {0:.3}s within {1:?}")]
    FrameTimeout(f64, Duration),

    #[error("failed to read video frame")]
    ReadFrame(#[source] BoxError),

    #[error("failed to control playback")]
    Playback(#[source] BoxError),

    #[error("failed to draw on canvas")]
    Draw(#[source] BoxError),

    #[error("encoder supports neither {0} nor {1}")]
    UnsupportedFormat(&'static str, &'static str),

    #[error("failed to start encoder")]
    StartEncoder(#[source] BoxError),

    #[error("failed to capture canvas into encoder")]
    CaptureFrame(#[source] BoxError),

    #[error("failed to stop encoder")]
    StopEncoder(#[source] BoxError),

    #[error("encoder produced no output")]
    EmptyOutput,

    #[error("cannot encode from an empty annotation track")]
    EmptyTrack,

    #[error("sampling step must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("failed to convert value to usize")]
    ConvertToUSize,

    #[error("failed to convert usize value to keypoint kind: {0}")]
    ConvertUSizeToKeypointKind(usize),

    #[error("expected {0} keypoints, got {1}")]
    KeypointCount(usize, usize),

    #[error("failed to read pose file: {1:?}")]
    ReadPoseFile(#[source] std::io::Error, PathBuf),

    #[error("failed to parse pose file: {1:?}")]
    ParsePoseFile(#[source] serde_json::Error, PathBuf),

    #[error("session generation {0} was superseded")]
    Superseded(u64),

    #[cfg(feature = "opencv")]
    #[error("failed to open video capture: {0}")]
    OpenCapture(String),

    #[cfg(feature = "opencv")]
    #[error("failed to open video writer: {0:?}")]
    OpenWriter(PathBuf),

    #[cfg(feature = "opencv")]
    #[error("opencv call failed")]
    OpenCv(#[source] opencv::Error),

    #[cfg(feature = "opencv")]
    #[error("failed to access encoded file: {1:?}")]
    EncodedFile(#[source] std::io::Error, PathBuf),
}

impl Error {
    /// Whether this error is the cooperative cancellation signal rather than a failure.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}
