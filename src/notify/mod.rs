mod mqtt;
pub use mqtt::MqttTransport;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use image::codecs::jpeg::JpegEncoder;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::error::{DispatchError, EncodingError};
use crate::source::Frame;

pub const SYSTEM_UP: &str = "System is up";
pub const SYSTEM_DOWN: &str = "System is down";
pub const INVALID_FRAME: &str = "Invalid captured frame";
pub const ENCODING_FAILED: &str = "Failed to send fall photo due to encoding issues.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Image { body: Vec<u8>, filename: String },
}

/// Delivers one message to the remote endpoint. Retries and reconnects are the
/// transport's own business; callers see a single outcome.
pub trait Transport: Send + Sync {
    fn deliver(&self, message: Message) -> BoxFuture<'static, Result<(), DispatchError>>;
}

/// Fire-and-forget dispatch. Every send runs on its own task so the capture
/// loop never waits on the network; failures end as a log line.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn Transport>,
    tracker: TaskTracker,
    image_filename: String,
    jpeg_quality: u8,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>, image_filename: impl Into<String>, jpeg_quality: u8) -> Self {
        Self {
            transport,
            tracker: TaskTracker::new(),
            image_filename: image_filename.into(),
            jpeg_quality,
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let text = text.into();
        self.tracker.spawn(async move {
            deliver_logged(transport.as_ref(), Message::Text(text)).await;
        })
    }

    /// Takes ownership of the frame; the caller keeps nothing to synchronize.
    pub fn send_image(&self, frame: Frame) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let filename = self.image_filename.clone();
        let quality = self.jpeg_quality;
        self.tracker.spawn(async move {
            let message = match encode_jpeg(&frame, quality) {
                Ok(body) => Message::Image { body, filename },
                Err(err) => {
                    tracing::warn!(%err, "failed to encode alert frame");
                    Message::Text(ENCODING_FAILED.to_string())
                }
            };
            deliver_logged(transport.as_ref(), message).await;
        })
    }

    /// Waits for in-flight notifications, giving up after `timeout`.
    /// Returns whether everything finished.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let finished = tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        if !finished {
            tracing::warn!(pending = self.tracker.len(), "notifications still in flight at shutdown");
        }
        finished
    }
}

async fn deliver_logged(transport: &dyn Transport, message: Message) {
    let kind = match &message {
        Message::Text(_) => "text",
        Message::Image { .. } => "image",
    };
    match transport.deliver(message).await {
        Ok(()) => tracing::debug!(kind, "notification sent"),
        Err(err) => tracing::warn!(kind, %err, "failed to send notification"),
    }
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodingError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(EncodingError::EmptyFrame {
            width: frame.width(),
            height: frame.height(),
        });
    }
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(frame)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    fn notifier(transport: &RecordingTransport) -> Notifier {
        Notifier::new(Arc::new(transport.clone()), "fall_detected.jpg", 90)
    }

    #[tokio::test]
    async fn test_send_text() {
        let transport = RecordingTransport::default();
        let notifier = notifier(&transport);
        notifier.send_text(SYSTEM_UP).await.unwrap();
        assert_eq!(transport.messages(), vec![Message::Text(SYSTEM_UP.to_string())]);
    }

    #[tokio::test]
    async fn test_send_image_is_jpeg() {
        let transport = RecordingTransport::default();
        let notifier = notifier(&transport);
        notifier.send_image(Frame::new(16, 16)).await.unwrap();

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::Image { body, filename } => {
                assert_eq!(filename, "fall_detected.jpg");
                assert_eq!(&body[..2], &[0xFF, 0xD8]);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_encoding_failure_falls_back_to_one_text() {
        let transport = RecordingTransport::default();
        let notifier = notifier(&transport);
        notifier.send_image(Frame::new(0, 0)).await.unwrap();
        assert_eq!(transport.messages(), vec![Message::Text(ENCODING_FAILED.to_string())]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let transport = RecordingTransport::failing();
        let notifier = notifier(&transport);
        // the task completes normally even though delivery failed
        notifier.send_image(Frame::new(8, 8)).await.unwrap();
        notifier.send_text("after failure").await.unwrap();
        assert_eq!(transport.attempts(), 2);
        assert!(transport.messages().is_empty());
    }

    #[tokio::test]
    async fn test_flush_waits_for_pending() {
        let transport = RecordingTransport::default();
        let notifier = notifier(&transport);
        notifier.send_text("one");
        notifier.send_text("two");
        assert!(notifier.flush(Duration::from_secs(1)).await);
        assert_eq!(transport.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_times_out_on_stuck_transport() {
        let transport = RecordingTransport::stalled();
        let notifier = notifier(&transport);
        notifier.send_text(SYSTEM_DOWN);
        assert!(!notifier.flush(Duration::from_millis(100)).await);
    }
}
