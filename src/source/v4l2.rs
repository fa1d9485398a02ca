use image::{ImageFormat, RgbImage};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::app::config::Camera;
use crate::error::AcquisitionError;
use crate::source::{Frame, VideoSource};

/// Camera capture through V4L2 memory-mapped streaming.
pub struct V4l2Source {
    stream: Option<Stream<'static>>,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl V4l2Source {
    const BUFFER_COUNT: u32 = 4;

    pub fn open(camera: &Camera) -> Result<Self, AcquisitionError> {
        let dev = Device::with_path(&camera.device)?;

        let mut fmt = dev.format()?;
        let code: [u8; 4] = camera
            .fourcc
            .as_bytes()
            .try_into()
            .map_err(|_| AcquisitionError::UnsupportedFormat(camera.fourcc.clone()))?;
        fmt.fourcc = FourCC::new(&code);
        fmt.width = camera.width;
        fmt.height = camera.height;
        // the driver may settle on the nearest supported mode
        let actual = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = camera.framerate;
        if let Err(err) = dev.set_params(&params) {
            tracing::warn!(%err, "camera rejected frame interval");
        }

        // the stream shares the device handle, so dropping it closes the fd
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, Self::BUFFER_COUNT)?;

        tracing::info!(
            "camera open: {}x{} [{}]",
            actual.width,
            actual.height,
            actual.fourcc
        );

        Ok(Self {
            stream: Some(stream),
            fourcc: actual.fourcc,
            width: actual.width,
            height: actual.height,
        })
    }
}

impl VideoSource for V4l2Source {
    fn capture_frame(&mut self) -> Result<Frame, AcquisitionError> {
        let stream = self.stream.as_mut().ok_or(AcquisitionError::NoData)?;
        let (data, _meta) = stream.next()?;
        if data.is_empty() {
            return Err(AcquisitionError::NoData);
        }
        match &self.fourcc.repr {
            b"MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()),
            b"YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            other => Err(AcquisitionError::UnsupportedFormat(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("camera stream stopped");
        }
    }
}

/// YUYV 4:2:2 to RGB, BT.601. Each 4-byte group `[Y0, U, Y1, V]` yields two pixels.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    if width == 0 {
        return out;
    }

    let convert = |y: f32, u: f32, v: f32| {
        image::Rgb([
            (y + 1.402 * v).clamp(0.0, 255.0) as u8,
            (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
            (y + 1.772 * u).clamp(0.0, 255.0) as u8,
        ])
    };

    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;

        let pixel = i as u32 * 2;
        let x = pixel % width;
        let y = pixel / width;
        if y >= height {
            break;
        }
        out.put_pixel(x, y, convert(chunk[0] as f32, u, v));
        if x + 1 < width {
            out.put_pixel(x + 1, y, convert(chunk[2] as f32, u, v));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_grey_and_white() {
        // two pixels of mid grey, two of white, neutral chroma
        let data = [128, 128, 128, 128, 255, 128, 255, 128];
        let rgb = yuyv_to_rgb(&data, 2, 2);
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([128, 128, 128]));
        assert_eq!(rgb.get_pixel(1, 0), &image::Rgb([128, 128, 128]));
        assert_eq!(rgb.get_pixel(0, 1), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn test_yuyv_short_buffer_leaves_black() {
        let rgb = yuyv_to_rgb(&[255, 128, 255, 128], 2, 2);
        assert_eq!(rgb.get_pixel(1, 0), &image::Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 1), &image::Rgb([0, 0, 0]));
    }
}
