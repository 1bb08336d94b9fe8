//! Frame source implementations and startup selection

pub mod capture;
pub mod synthetic;

pub use capture::LiveCapture;
pub use synthetic::SyntheticGenerator;

use tracing::{info, warn};

use crate::ProducerConfig;
use crate::source::FrameSource;

/// Pick the frame source once at startup.
///
/// A configured capture that cannot be opened falls back to the synthetic
/// generator; that is a supported mode, not an error.
pub fn open_source(config: &ProducerConfig) -> Box<dyn FrameSource> {
    if let Some(path) = &config.capture {
        match LiveCapture::open(path, config.width, config.height, config.mirror) {
            Ok(capture) => {
                info!("Using live capture: {}", capture.describe());
                return Box::new(capture);
            }
            Err(e) => {
                warn!("Cannot open capture {}: {}", path.display(), e);
                warn!("Falling back to synthetic frames");
            }
        }
    }

    let generator = SyntheticGenerator::new(config.width, config.height);
    info!("Using {}", generator.describe());
    Box::new(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_capture_falls_back_to_synthetic() {
        let config = ProducerConfig {
            capture: Some("/nonexistent/capture/dir".into()),
            width: 32,
            height: 24,
            ..ProducerConfig::default()
        };

        let mut source = open_source(&config);
        assert!(source.describe().starts_with("synthetic"));

        let frame = source.next_frame(0).await.unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }
}
