mod aggregate;
pub use aggregate::FrameScores;
pub use aggregate::aggregate_scores;

mod decision;
pub use decision::FallDecisionEngine;
pub use decision::Thresholds;
pub use decision::Verdict;

pub mod overlay;

mod tflite;
pub use self::tflite::TFLiteDetector;

use crate::error::DetectError;
use crate::source::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassId {
    NotFalling,
    Falling,
    Other(u32),
}

impl ClassId {
    pub const NOT_FALLING_INDEX: u32 = 0;
    pub const FALLING_INDEX: u32 = 1;

    pub fn from_index(index: u32) -> Self {
        match index {
            Self::NOT_FALLING_INDEX => ClassId::NotFalling,
            Self::FALLING_INDEX => ClassId::Falling,
            other => ClassId::Other(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClassId::Falling => "fall",
            ClassId::NotFalling => "not_fall",
            ClassId::Other(_) => "unknown",
        }
    }
}

/// One scored, classed bounding box in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class: ClassId,
}

pub type Detections = Vec<Detection>;

/// Maps a frame to the objects found in it. Implementations may keep
/// internal buffers but carry no state between frames.
pub trait Detector {
    fn infer(&mut self, frame: &Frame) -> Result<Detections, DetectError>;
}
