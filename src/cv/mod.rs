//! Media collaborators backed by OpenCV.

mod canvas;
mod capture;
mod writer;

pub use canvas::MatCanvas;
pub use capture::{CaptureVideo, VideoFrame};
pub use writer::WriterSink;
