mod playback;
pub use playback::PlaybackSource;

mod v4l2;
pub use v4l2::V4l2Source;

use image::RgbImage;

use crate::app::config::{Camera, Flip};
use crate::error::{AcquisitionError, StartupError};

/// An RGB frame as captured, mutated in place by overlay drawing.
pub type Frame = RgbImage;

/// A source of frames. Opening happens in each backend's constructor.
pub trait VideoSource {
    fn capture_frame(&mut self) -> Result<Frame, AcquisitionError>;

    /// Release the underlying device. Called once when the capture session ends.
    fn close(&mut self);
}

pub fn apply_flip(frame: &mut Frame, flip: Flip) {
    match flip {
        Flip::None => {}
        Flip::Vertical => image::imageops::flip_vertical_in_place(frame),
        Flip::Rotate180 => image::imageops::rotate180_in_place(frame),
    }
}

/// Picks the backend the configuration asks for: the camera when enabled,
/// otherwise image playback from a directory.
pub fn open(camera: &Camera) -> Result<Box<dyn VideoSource>, StartupError> {
    if camera.enabled {
        tracing::info!(%camera, "opening camera");
        let source = V4l2Source::open(camera).map_err(StartupError::Source)?;
        return Ok(Box::new(source));
    }
    match &camera.playback_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "camera disabled, replaying frames from directory");
            let source = PlaybackSource::open(dir).map_err(StartupError::Source)?;
            Ok(Box::new(source))
        }
        None => Err(StartupError::NoVideoSource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn marked() -> Frame {
        let mut frame = Frame::new(2, 2);
        frame.put_pixel(0, 0, Rgb([255, 0, 0]));
        frame
    }

    #[test]
    fn test_flip_vertical() {
        let mut frame = marked();
        apply_flip(&mut frame, Flip::Vertical);
        assert_eq!(frame.get_pixel(0, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_flip_rotate180() {
        let mut frame = marked();
        apply_flip(&mut frame, Flip::Rotate180);
        assert_eq!(frame.get_pixel(1, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_no_source_configured() {
        let camera = Camera {
            enabled: false,
            playback_dir: None,
            ..Camera::default()
        };
        assert!(matches!(open(&camera), Err(StartupError::NoVideoSource)));
    }
}
