use tokio::time::Instant;

use crate::app::config::{DetectionConfig, Flip};
use crate::app::lifecycle::ContinuationFlag;
use crate::error::AcquisitionError;
use crate::notify::{Notifier, INVALID_FRAME};
use crate::pipeline::{aggregate_scores, overlay, Detector, FallDecisionEngine, Verdict};
use crate::preview::{Preview, PreviewEvent};
use crate::source::{apply_flip, Frame, VideoSource};

/// Owns the video source and preview window for the life of the loop and
/// releases both exactly once, on every exit path including unwinding.
pub struct CaptureSession {
    source: Box<dyn VideoSource>,
    preview: Option<Box<dyn Preview>>,
    released: bool,
}

impl CaptureSession {
    pub fn new(source: Box<dyn VideoSource>, preview: Option<Box<dyn Preview>>) -> Self {
        Self {
            source,
            preview,
            released: false,
        }
    }

    pub fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        self.source.close();
        if let Some(preview) = self.preview.as_mut() {
            preview.close();
        }
        tracing::info!("video source released");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

enum Step {
    Continue,
    Stop,
}

/// The capture/inference loop. Frames are processed strictly one at a time.
pub struct Monitor {
    session: CaptureSession,
    detector: Box<dyn Detector>,
    engine: FallDecisionEngine,
    notifier: Notifier,
    flag: ContinuationFlag,
    flip: Flip,
    draw_threshold: f32,
}

impl Monitor {
    pub fn new(
        session: CaptureSession,
        detector: Box<dyn Detector>,
        detection: &DetectionConfig,
        flip: Flip,
        notifier: Notifier,
        flag: ContinuationFlag,
    ) -> Self {
        Self {
            session,
            detector,
            engine: FallDecisionEngine::from_config(detection),
            notifier,
            flag,
            flip,
            draw_threshold: detection.draw_threshold,
        }
    }

    /// Runs until the continuation flag is cleared, the source is exhausted
    /// or the preview asks to quit. Shutdown takes effect between frames.
    pub async fn run(&mut self) {
        let mut frames: u64 = 0;
        while self.flag.should_continue() {
            if let Step::Stop = self.step() {
                break;
            }
            frames += 1;
            // lets the signal listener and dispatch tasks in on a single-threaded runtime
            tokio::task::yield_now().await;
        }
        tracing::info!(frames, "capture loop finished");
    }

    pub fn release(&mut self) {
        self.session.release();
    }

    fn step(&mut self) -> Step {
        let mut frame = match self.session.source.capture_frame() {
            Ok(frame) => frame,
            Err(AcquisitionError::EndOfStream) => {
                tracing::info!("video source exhausted");
                return Step::Stop;
            }
            Err(err) => {
                tracing::warn!(%err, "invalid captured frame");
                self.notifier.send_text(INVALID_FRAME);
                return Step::Continue;
            }
        };
        apply_flip(&mut frame, self.flip);

        self.process_frame(&mut frame, Instant::now());

        if let Some(preview) = self.session.preview.as_mut() {
            if preview.show(&frame) == PreviewEvent::Quit {
                tracing::info!("quit requested from preview");
                return Step::Stop;
            }
        }
        Step::Continue
    }

    /// Detect, draw, decide and, on alert, dispatch the annotated frame.
    /// Returns `None` when the detector failed and the frame was skipped.
    pub fn process_frame(&mut self, frame: &mut Frame, now: Instant) -> Option<Verdict> {
        let dets = match self.detector.infer(frame) {
            Ok(dets) => dets,
            Err(err) => {
                tracing::warn!(%err, "inference failed, skipping frame");
                return None;
            }
        };
        overlay::draw_detections(frame, &dets, self.draw_threshold);

        let scores = aggregate_scores(&dets);
        tracing::trace!(
            detections = dets.len(),
            fall_score = scores.fall_score,
            not_fall_score = scores.not_fall_score,
            "frame scored"
        );

        let verdict = self.engine.evaluate(&scores, now);
        if verdict.is_alert() {
            tracing::info!(fall_score = scores.fall_score, "fall detected, sending alert");
            overlay::draw_alert(frame);
            self.notifier.send_image(frame.clone());
        }
        Some(verdict)
    }
}
