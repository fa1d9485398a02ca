use crate::pipeline::ClassId;
use crate::pipeline::Detection;

/// Highest confidence seen per class in a single frame, 0 when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameScores {
    pub fall_score: f32,
    pub not_fall_score: f32,
}

pub fn aggregate_scores(dets: &[Detection]) -> FrameScores {
    let mut scores = FrameScores::default();
    for det in dets {
        match det.class {
            ClassId::Falling => scores.fall_score = scores.fall_score.max(det.confidence),
            ClassId::NotFalling => scores.not_fall_score = scores.not_fall_score.max(det.confidence),
            ClassId::Other(_) => {}
        }
    }
    scores
}
