pub mod config;
pub mod lifecycle;
pub mod monitor;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::app::config::AppConfig;
use crate::app::lifecycle::ContinuationFlag;
use crate::app::monitor::{CaptureSession, Monitor};
use crate::error::{AppError, StartupError};
use crate::notify::{MqttTransport, Notifier};
use crate::pipeline::TFLiteDetector;
use crate::{preview, source};

macro_rules! handle_err {
    ($signals:ident, $expr:expr) => {
        match $expr {
            Ok(ret) => Ok(ret),
            Err(err) => {
                $signals.abort();
                Err(err)
            }
        }
    };
}

pub struct App {
    monitor: Monitor,
    notifier: Notifier,
    transport: Arc<MqttTransport>,
    signals: JoinHandle<()>,
    flush_timeout: Duration,
}

impl App {
    /// Loads the model and opens the video source. Any failure here is fatal
    /// and happens before the "system up" notification.
    pub async fn start(config: AppConfig) -> Result<App, StartupError> {
        config.validate()?;

        let flag = ContinuationFlag::new();
        let signals = lifecycle::listen_for_signals(flag.clone()).map_err(StartupError::Signals)?;

        let transport = Arc::new(handle_err!(signals, MqttTransport::new(&config.mqtt))?);
        transport.connect(&config.mqtt).await;
        let notifier = Notifier::new(
            transport.clone(),
            config.mqtt.image_filename.clone(),
            config.mqtt.jpeg_quality,
        );

        let detector = handle_err!(signals, TFLiteDetector::new(&config.pipeline))?;
        let source = handle_err!(signals, source::open(&config.camera))?;
        let preview = preview::open(&config.preview);

        let monitor = Monitor::new(
            CaptureSession::new(source, preview),
            Box::new(detector),
            &config.detection,
            config.camera.flip,
            notifier.clone(),
            flag,
        );
        tracing::debug!(detection = ?config.detection, "monitor ready");

        Ok(Self {
            monitor,
            notifier,
            transport,
            signals,
            flush_timeout: config.shutdown.flush_timeout(),
        })
    }

    pub async fn run(self) -> Result<(), AppError> {
        let result = lifecycle::supervise(self.monitor, &self.notifier, self.flush_timeout).await;
        self.signals.abort();
        self.transport.disconnect().await;
        result
    }
}
