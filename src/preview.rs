use crate::app::config::PreviewConfig;
use crate::source::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewEvent {
    Continue,
    Quit,
}

/// A local window showing the annotated frame.
pub trait Preview {
    fn show(&mut self, frame: &Frame) -> PreviewEvent;
    fn close(&mut self);
}

pub fn open(config: &PreviewConfig) -> Option<Box<dyn Preview>> {
    if !config.enabled {
        return None;
    }
    open_window(config)
}

#[cfg(feature = "preview")]
fn open_window(config: &PreviewConfig) -> Option<Box<dyn Preview>> {
    match highgui::HighGuiPreview::open(config) {
        Ok(preview) => Some(Box::new(preview)),
        Err(err) => {
            tracing::warn!(%err, "failed to open preview window, running headless");
            None
        }
    }
}

#[cfg(not(feature = "preview"))]
fn open_window(_config: &PreviewConfig) -> Option<Box<dyn Preview>> {
    tracing::warn!("preview requested but built without the `preview` feature, running headless");
    None
}

#[cfg(feature = "preview")]
mod highgui {
    use opencv::core::Mat;
    use opencv::highgui;
    use opencv::prelude::*;

    use super::{Preview, PreviewEvent};
    use crate::app::config::PreviewConfig;
    use crate::source::Frame;

    pub struct HighGuiPreview {
        window: String,
        quit_key: i32,
        open: bool,
    }

    impl HighGuiPreview {
        pub fn open(config: &PreviewConfig) -> opencv::Result<Self> {
            highgui::named_window(&config.window_name, highgui::WINDOW_AUTOSIZE)?;
            Ok(Self {
                window: config.window_name.clone(),
                quit_key: config.quit_key,
                open: true,
            })
        }

        fn render(&self, frame: &Frame) -> opencv::Result<i32> {
            // highgui expects BGR
            let bgr: Vec<u8> = frame
                .pixels()
                .flat_map(|p| [p.0[2], p.0[1], p.0[0]])
                .collect();
            let flat = Mat::from_slice(&bgr)?;
            let image = flat.reshape(3, frame.height() as i32)?;
            highgui::imshow(&self.window, &image.try_clone()?)?;
            highgui::wait_key(5)
        }
    }

    impl Preview for HighGuiPreview {
        fn show(&mut self, frame: &Frame) -> PreviewEvent {
            match self.render(frame) {
                Ok(key) if key & 0xFF == self.quit_key => PreviewEvent::Quit,
                Ok(_) => PreviewEvent::Continue,
                Err(err) => {
                    tracing::warn!(%err, "preview failed");
                    PreviewEvent::Continue
                }
            }
        }

        fn close(&mut self) {
            if std::mem::take(&mut self.open) {
                if let Err(err) = highgui::destroy_all_windows() {
                    tracing::warn!(%err, "failed to close preview window");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_preview_opens_nothing() {
        assert!(open(&PreviewConfig::default()).is_none());
    }
}
