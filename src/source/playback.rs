use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AcquisitionError;
use crate::source::{Frame, VideoSource};

const EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Replays the images of a directory in file-name order, one per capture.
pub struct PlaybackSource {
    pending: VecDeque<PathBuf>,
}

impl PlaybackSource {
    pub fn open(dir: &Path) -> Result<Self, AcquisitionError> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();
        tracing::debug!(count = files.len(), dir = %dir.display(), "queued playback frames");
        Ok(Self { pending: files.into() })
    }
}

impl VideoSource for PlaybackSource {
    fn capture_frame(&mut self) -> Result<Frame, AcquisitionError> {
        let path = self.pending.pop_front().ok_or(AcquisitionError::EndOfStream)?;
        tracing::trace!(path = %path.display(), "reading playback frame");
        let frame = image::open(&path)?.to_rgb8();
        if frame.width() == 0 || frame.height() == 0 {
            return Err(AcquisitionError::NoData);
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_sorted_then_ends() {
        let dir = std::env::temp_dir().join(format!("falldetect-playback-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        Frame::new(4, 2).save(dir.join("b.png")).unwrap();
        Frame::new(2, 2).save(dir.join("a.png")).unwrap();
        fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let mut source = PlaybackSource::open(&dir).unwrap();
        assert_eq!(source.capture_frame().unwrap().width(), 2);
        assert_eq!(source.capture_frame().unwrap().width(), 4);
        assert!(matches!(source.capture_frame(), Err(AcquisitionError::EndOfStream)));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unreadable_file_is_acquisition_error() {
        let dir = std::env::temp_dir().join(format!("falldetect-corrupt-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0001.jpg"), b"not a jpeg").unwrap();

        let mut source = PlaybackSource::open(&dir).unwrap();
        assert!(matches!(source.capture_frame(), Err(AcquisitionError::Decode(_))));
        assert!(matches!(source.capture_frame(), Err(AcquisitionError::EndOfStream)));

        fs::remove_dir_all(&dir).unwrap();
    }
}
