use crate::{
    cv::canvas::MatCanvas,
    error::Error,
    media::{EncoderSink, MediaFormat},
};
use crossbeam::channel::Sender;
use opencv::{core::Size, prelude::*, videoio::VideoWriter};
use std::{
    env, fs,
    io::Read,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicUsize, Ordering},
};
use tracing::{debug, info, warn};

/// Size of the chunks the encoded file is streamed back in.
const CHUNK_SIZE: usize = 64 * 1024;

static SESSIONS: AtomicUsize = AtomicUsize::new(0);

fn fourcc([a, b, c, d]: [char; 4]) -> Result<i32, Error> {
    VideoWriter::fourcc(a, b, c, d).map_err(Error::OpenCv)
}

/// Scratch file that is removed when dropped, whatever happened to it.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.0.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.0) {
            warn!(message = "failed to remove scratch file", path = %self.0.display(), error = %e);
        }
    }
}

struct Session {
    writer: VideoWriter,
    file: ScratchFile,
    chunks: Sender<Vec<u8>>,
}

/// [`EncoderSink`] that records canvases with a `VideoWriter` into a scratch file and streams the
/// file back as chunks once stopped.
pub struct WriterSink {
    scratch: PathBuf,
    fps: f64,
    size: (u32, u32),
    session: Option<Session>,
}

impl WriterSink {
    pub fn new(fps: f64, size: (u32, u32)) -> Self {
        Self::with_scratch_dir(env::temp_dir(), fps, size)
    }

    pub fn with_scratch_dir<P: AsRef<Path>>(dir: P, fps: f64, size: (u32, u32)) -> Self {
        Self {
            scratch: dir.as_ref().to_owned(),
            fps,
            size,
            session: None,
        }
    }

    fn scratch_file(&self, format: &MediaFormat) -> ScratchFile {
        let session = SESSIONS.fetch_add(1, Ordering::SeqCst);
        ScratchFile(self.scratch.join(format!(
            "rokfit-{}-{}.{}",
            process::id(),
            session,
            format.extension
        )))
    }

    fn open(&self, format: &MediaFormat, path: &Path) -> Result<VideoWriter, Error> {
        let name = path
            .to_str()
            .ok_or_else(|| Error::OpenWriter(path.to_owned()))?;
        let (width, height) = self.size;
        let writer = VideoWriter::new(
            name,
            fourcc(format.fourcc)?,
            self.fps,
            Size::new(width as i32, height as i32),
            true,
        )
        .map_err(|e| Error::StartEncoder(Box::new(e)))?;
        if writer.is_opened().map_err(Error::OpenCv)? {
            Ok(writer)
        } else {
            Err(Error::OpenWriter(path.to_owned()))
        }
    }
}

/// Send the file at `path` down `chunks`.
fn stream_back(path: &Path, chunks: &Sender<Vec<u8>>) -> Result<usize, Error> {
    let mut file = fs::File::open(path).map_err(|e| Error::EncodedFile(e, path.to_owned()))?;
    let mut total = 0;
    loop {
        let mut chunk = vec![0; CHUNK_SIZE];
        let read = file
            .read(&mut chunk)
            .map_err(|e| Error::EncodedFile(e, path.to_owned()))?;
        if read == 0 {
            break;
        }
        chunk.truncate(read);
        total += read;
        if chunks.send(chunk).is_err() {
            debug!(message = "chunk receiver gone, discarding the rest");
            break;
        }
    }
    Ok(total)
}

impl EncoderSink<MatCanvas> for WriterSink {
    fn supports(&self, format: &MediaFormat) -> bool {
        let file = self.scratch_file(format);
        // the writer has to be closed before its file goes away
        let supported = self.open(format, file.path()).is_ok();
        supported
    }

    fn start(&mut self, format: &MediaFormat, chunks: Sender<Vec<u8>>) -> Result<(), Error> {
        let file = self.scratch_file(format);
        let writer = self.open(format, file.path())?;
        info!(message = "recording", format = format.mime_type, path = %file.path().display());
        self.session = Some(Session {
            writer,
            file,
            chunks,
        });
        Ok(())
    }

    fn capture(&mut self, canvas: &MatCanvas) -> Result<(), Error> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::CaptureFrame("encoder not started".into()))?;
        session
            .writer
            .write(canvas.mat())
            .map_err(|e| Error::CaptureFrame(Box::new(e)))
    }

    fn stop(&mut self) -> Result<(), Error> {
        let Session {
            mut writer,
            file,
            chunks,
        } = match self.session.take() {
            Some(session) => session,
            None => return Ok(()),
        };
        let released = writer
            .release()
            .map_err(|e| Error::StopEncoder(Box::new(e)));
        drop(writer);
        released?;
        let bytes = stream_back(file.path(), &chunks)?;
        debug!(message = "encoder flushed", bytes);
        // dropping `chunks` tells the receiver nothing else is coming, dropping `file` removes it
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    fn scratch_with(name: &str, contents: &[u8]) -> ScratchFile {
        let path = env::temp_dir().join(format!("rokfit-test-{}-{}", process::id(), name));
        fs::write(&path, contents).unwrap();
        ScratchFile(path)
    }

    #[test]
    fn scratch_file_is_removed_on_drop() {
        let file = scratch_with("drop", b"partial");
        let path = file.path().to_owned();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn streamed_file_is_removed_even_without_a_receiver() {
        let file = scratch_with("stream", &vec![7; CHUNK_SIZE + 10]);
        let path = file.path().to_owned();
        let (sender, receiver) = channel::unbounded();
        drop(receiver);

        // the first send fails, streaming stops early
        assert_eq!(stream_back(file.path(), &sender).unwrap(), CHUNK_SIZE);
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn streams_whole_file_in_chunks() {
        let file = scratch_with("chunks", &vec![1; CHUNK_SIZE + 10]);
        let (sender, receiver) = channel::unbounded();
        assert_eq!(stream_back(file.path(), &sender).unwrap(), CHUNK_SIZE + 10);
        drop(sender);
        let sizes: Vec<usize> = receiver.iter().map(|chunk| chunk.len()).collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, 10]);
    }

    #[test]
    fn stopping_an_idle_sink_is_a_no_op() {
        let mut sink = WriterSink::new(30.0, (64, 48));
        assert!(!EncoderSink::<MatCanvas>::is_recording(&sink));
        EncoderSink::<MatCanvas>::stop(&mut sink).unwrap();
    }
}
