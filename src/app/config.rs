use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use config::{Config, ConfigError};

use crate::error::StartupError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub camera: Camera,
    pub mqtt: MQTTConfig,
    pub preview: PreviewConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub high_confidence_threshold: f32,
    pub low_confidence_threshold: f32,
    pub draw_threshold: f32,
    pub cooldown_secs: u64,
}

impl DetectionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_filename: String,
    pub num_threads: u8,
    pub min_score: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flip {
    None,
    Vertical,
    Rotate180,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub enabled: bool,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fourcc: String,
    pub framerate: u32,
    pub flip: Flip,
    pub playback_dir: Option<PathBuf>,
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}x{} [{}], {}fps, flip {:?}",
            self.device, self.width, self.height, self.fourcc, self.framerate, self.flip
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MQTTConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
    pub topic_prefix: String,
    pub image_filename: String,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub window_name: String,
    pub quit_key: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub flush_timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 0.50,
            low_confidence_threshold: 0.40,
            draw_threshold: 0.50,
            cooldown_secs: 10,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_filename: "models/best_30e_500_float16.tflite".to_string(),
            num_threads: 2,
            min_score: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            enabled: true,
            device: "/dev/video0".to_string(),
            width: 800,
            height: 600,
            fourcc: "MJPG".to_string(),
            framerate: 30,
            flip: Flip::Vertical,
            playback_dir: None,
        }
    }
}

impl Default for MQTTConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: "username".to_string(),
            password: "password".to_string(),
            recipient: "falldetect".to_string(),
            topic_prefix: "alerts".to_string(),
            image_filename: "fall_detected.jpg".to_string(),
            jpeg_quality: 90,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_name: "Fall Detector".to_string(),
            quit_key: 27,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            flush_timeout_ms: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("falldetect")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        let d = &self.detection;
        for (name, value) in [
            ("high_confidence_threshold", d.high_confidence_threshold),
            ("low_confidence_threshold", d.low_confidence_threshold),
            ("draw_threshold", d.draw_threshold),
            ("min_score", self.pipeline.min_score),
            ("iou_threshold", self.pipeline.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StartupError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.mqtt.jpeg_quality == 0 || self.mqtt.jpeg_quality > 100 {
            return Err(StartupError::InvalidConfig(format!(
                "jpeg_quality must be within [1, 100], got {}",
                self.mqtt.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.detection.high_confidence_threshold, 0.50);
        assert_eq!(config.detection.low_confidence_threshold, 0.40);
        assert_eq!(config.detection.cooldown(), Duration::from_secs(10));
        assert_eq!(config.camera.flip, Flip::Vertical);
        assert_eq!(config.pipeline.model_filename, "models/best_30e_500_float16.tflite");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("falldetect-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "detection:\n  cooldown_secs: 30\ncamera:\n  enabled: false\n  flip: rotate180\n  playback_dir: /tmp/frames").unwrap();
        drop(file);

        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.detection.cooldown_secs, 30);
        assert_eq!(config.detection.draw_threshold, 0.50);
        assert!(!config.camera.enabled);
        assert_eq!(config.camera.flip, Flip::Rotate180);
        assert_eq!(config.camera.playback_dir, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(config.mqtt.image_filename, "fall_detected.jpg");
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.detection.high_confidence_threshold = 1.5;
        assert!(matches!(config.validate(), Err(StartupError::InvalidConfig(_))));
    }
}
