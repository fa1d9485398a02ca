use std::time::Duration;

use tokio::time::Instant;

use crate::app::config::DetectionConfig;
use crate::pipeline::FrameScores;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub high_confidence: f32,
    pub low_confidence: f32,
}

impl Thresholds {
    /// A frame qualifies when the fall class is confidently present and the
    /// not-fall class is confidently absent.
    pub fn qualifies(&self, scores: &FrameScores) -> bool {
        scores.fall_score > self.high_confidence && scores.not_fall_score < self.low_confidence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Frame did not qualify; the cooldown anchor was cleared.
    Clear,
    /// First qualifying frame after a reset; timer started, no alert.
    Armed,
    /// Qualifying frame inside the cooldown window.
    CoolingDown,
    /// Qualifying frame after the cooldown elapsed.
    Alert,
}

impl Verdict {
    pub fn is_alert(&self) -> bool {
        matches!(self, Verdict::Alert)
    }
}

/// Turns per-frame scores into alert decisions. Owns the alert anchor, which
/// is only ever touched from the capture loop.
pub struct FallDecisionEngine {
    thresholds: Thresholds,
    cooldown: Duration,
    last_alert_time: Option<Instant>,
}

impl FallDecisionEngine {
    pub fn new(thresholds: Thresholds, cooldown: Duration) -> Self {
        Self {
            thresholds,
            cooldown,
            last_alert_time: None,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            Thresholds {
                high_confidence: config.high_confidence_threshold,
                low_confidence: config.low_confidence_threshold,
            },
            config.cooldown(),
        )
    }

    pub fn last_alert_time(&self) -> Option<Instant> {
        self.last_alert_time
    }

    pub fn evaluate(&mut self, scores: &FrameScores, now: Instant) -> Verdict {
        if !self.thresholds.qualifies(scores) {
            if self.last_alert_time.take().is_some() {
                tracing::debug!(
                    fall_score = scores.fall_score,
                    not_fall_score = scores.not_fall_score,
                    "fall condition cleared"
                );
            }
            return Verdict::Clear;
        }

        let verdict = match self.last_alert_time {
            None => {
                self.last_alert_time = Some(now);
                Verdict::Armed
            }
            Some(last) if now.saturating_duration_since(last) > self.cooldown => {
                self.last_alert_time = Some(now);
                Verdict::Alert
            }
            Some(_) => Verdict::CoolingDown,
        };
        tracing::debug!(
            fall_score = scores.fall_score,
            not_fall_score = scores.not_fall_score,
            ?verdict,
            "fall condition holds"
        );
        verdict
    }
}
