use std::io;

use thiserror::Error;

/// Fatal conditions that stop the process before the capture loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to load detection model: {0}")]
    Model(#[from] DetectError),
    #[error("failed to open video source: {0}")]
    Source(#[source] AcquisitionError),
    #[error("camera is not available and no playback directory is configured")]
    NoVideoSource,
    #[error("failed to create messaging client: {0}")]
    Transport(#[from] paho_mqtt::Error),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}

/// The video source produced no usable frame.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("video source returned no data")]
    NoData,
    #[error("video source is exhausted")]
    EndOfStream,
    #[error("video device error: {0}")]
    Device(#[from] io::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
}

/// The remote endpoint could not be reached or rejected a message.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("mqtt: {0}")]
    Mqtt(#[from] paho_mqtt::Error),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// A frame could not be compressed for image dispatch.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("tflite: {0}")]
    Model(String),
    #[error("unexpected tensor shape {dims:?} for {tensor}")]
    TensorShape { tensor: &'static str, dims: Vec<usize> },
    #[error("{tensor} tensor is {kind}, expected float32")]
    TensorType { tensor: &'static str, kind: String },
}

impl From<tflite::Error> for DetectError {
    fn from(err: tflite::Error) -> Self {
        DetectError::Model(format!("{err:?}"))
    }
}

/// Errors surfaced by a run that made it past startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("capture loop panicked: {0}")]
    LoopPanicked(String),
}
