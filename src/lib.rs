//! Offline exercise repetition counting: analyze a recorded workout, then re-encode it with the
//! skeleton and running count burned in.

pub mod analysis;
pub mod config;
#[cfg(feature = "opencv")]
pub mod cv;
pub mod encoding;
pub mod error;
pub mod exercise;
pub mod generation;
pub mod media;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod replay;
#[cfg(test)]
mod testing;
pub mod track;

pub use config::PipelineConfig;
pub use error::Error;
pub use exercise::{CountResult, ExerciseMode, Feedback, RepCounter};
pub use generation::ResetHandle;
pub use media::EncodedVideo;
pub use pipeline::{Phase, Pipeline, PipelineState};
pub use replay::PoseReplay;
pub use track::{AnnotationEntry, AnnotationTrack};
