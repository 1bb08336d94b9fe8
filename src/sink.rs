//! Output sinks for processed frames

use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::codec::FrameCodec;
use crate::{Result, StreamError};

/// Default JPEG quality for saved frames
pub const DEFAULT_OUTPUT_QUALITY: u8 = 95;

/// Destination for processed images.
///
/// Called concurrently from worker threads; each call writes one frame id.
pub trait Sink: Send + Sync + 'static {
    /// Persist `image` and return where it went
    fn write(&self, frame_id: u64, image: &RgbImage) -> Result<String>;
}

/// Writes `frame_NNNN.jpg` files into one directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    codec: FrameCodec,
}

impl DirectorySink {
    /// Create the directory if needed
    pub fn create(dir: impl AsRef<Path>, quality: u8) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StreamError::file_error(dir.clone(), e))?;
        info!("Saving processed frames to {}", dir.display());
        Ok(Self { dir, codec: FrameCodec::new(quality)? })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output path for a frame id
    pub fn path_for(&self, frame_id: u64) -> PathBuf {
        self.dir.join(format!("frame_{:04}.jpg", frame_id))
    }
}

impl Sink for DirectorySink {
    fn write(&self, frame_id: u64, image: &RgbImage) -> Result<String> {
        let path = self.path_for(frame_id);
        let location = path.display().to_string();

        let bytes = self.codec.encode_image(image).map_err(|e| StreamError::sink(&location, e))?;
        std::fs::write(&path, &bytes).map_err(|e| StreamError::sink(&location, e))?;

        debug!(frame_id, bytes = bytes.len(), "Wrote {}", location);
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn frames_are_written_with_padded_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(dir.path().join("out"), 90).unwrap();

        let image = RgbImage::from_pixel(8, 6, Rgb([192, 192, 192]));
        let location = sink.write(7, &image).unwrap();
        assert!(location.ends_with("frame_0007.jpg"));

        let saved = image::open(sink.path_for(7)).unwrap().into_rgb8();
        assert_eq!(saved.dimensions(), (8, 6));

        let location = sink.write(12345, &image).unwrap();
        assert!(location.ends_with("frame_12345.jpg"));
    }

    #[test]
    fn write_failure_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(dir.path(), 90).unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();

        let err = sink.write(1, &RgbImage::new(4, 4)).unwrap_err();
        assert!(matches!(err, StreamError::Sink { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn invalid_quality_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectorySink::create(dir.path(), 101).is_err());
    }
}
