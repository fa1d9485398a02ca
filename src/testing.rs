//! Deterministic stand-ins for the camera, the model and the messaging endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{AcquisitionError, DetectError, DispatchError};
use crate::notify::{Message, Transport};
use crate::pipeline::{ClassId, Detection, Detections, Detector};
use crate::source::{Frame, VideoSource};

#[derive(Clone, Copy, Default)]
enum Behaviour {
    #[default]
    Record,
    Fail,
    Stall,
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    messages: Arc<Mutex<Vec<Message>>>,
    attempts: Arc<AtomicUsize>,
    behaviour: Behaviour,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self { behaviour: Behaviour::Fail, ..Self::default() }
    }

    pub fn stalled() -> Self {
        Self { behaviour: Behaviour::Stall, ..Self::default() }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Text(text) => Some(text),
                Message::Image { .. } => None,
            })
            .collect()
    }

    pub fn images(&self) -> usize {
        self.messages()
            .iter()
            .filter(|m| matches!(m, Message::Image { .. }))
            .count()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, message: Message) -> BoxFuture<'static, Result<(), DispatchError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Record => {
                self.messages.lock().unwrap().push(message);
                futures::future::ready(Ok(())).boxed()
            }
            Behaviour::Fail => {
                futures::future::ready(Err(DispatchError::Rejected("endpoint unreachable".into()))).boxed()
            }
            Behaviour::Stall => futures::future::pending().boxed(),
        }
    }
}

/// What the scripted source does on one capture call.
pub enum Capture {
    Frame,
    NoData,
    Panic,
    /// Runs the hook (typically a stop request) and then yields a frame.
    Hook(Box<dyn FnOnce() + Send>),
}

pub struct ScriptedSource {
    script: VecDeque<Capture>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Capture>) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = Self {
            script: script.into_iter().collect(),
            closes: closes.clone(),
        };
        (source, closes)
    }
}

impl VideoSource for ScriptedSource {
    fn capture_frame(&mut self) -> Result<Frame, AcquisitionError> {
        match self.script.pop_front() {
            Some(Capture::Frame) => Ok(Frame::new(64, 48)),
            Some(Capture::NoData) => Err(AcquisitionError::NoData),
            Some(Capture::Panic) => panic!("camera driver crashed"),
            Some(Capture::Hook(hook)) => {
                hook();
                Ok(Frame::new(64, 48))
            }
            None => Err(AcquisitionError::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns the same detections for every frame.
pub struct ScriptedDetector {
    pub dets: Detections,
}

impl ScriptedDetector {
    pub fn scoring(fall: f32, not_fall: f32) -> Self {
        Self {
            dets: vec![detection(ClassId::Falling, fall), detection(ClassId::NotFalling, not_fall)],
        }
    }
}

impl Detector for ScriptedDetector {
    fn infer(&mut self, _frame: &Frame) -> Result<Detections, DetectError> {
        Ok(self.dets.clone())
    }
}

pub fn detection(class: ClassId, confidence: f32) -> Detection {
    Detection { x1: 4.0, y1: 20.0, x2: 30.0, y2: 40.0, confidence, class }
}
