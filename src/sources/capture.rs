//! Live capture from a directory of still images.
//!
//! Files are read in name order, one per frame. Each sample is converted to
//! RGB, optionally mirrored, and resized to the configured dimensions.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::source::FrameSource;
use crate::{Frame, Result, StreamError};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Frame source backed by a capture directory
#[derive(Debug)]
pub struct LiveCapture {
    root: PathBuf,
    pending: VecDeque<PathBuf>,
    width: u32,
    height: u32,
    mirror: bool,
}

impl LiveCapture {
    /// Open a capture directory.
    ///
    /// Fails when the directory cannot be listed or holds no images.
    pub fn open(root: impl AsRef<Path>, width: u32, height: u32, mirror: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries =
            std::fs::read_dir(&root).map_err(|e| StreamError::file_error(root.clone(), e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(StreamError::config(format!(
                "capture directory {} holds no images",
                root.display()
            )));
        }

        debug!("Capture {} holds {} images", root.display(), files.len());
        Ok(Self { root, pending: files.into(), width, height, mirror })
    }

    /// Images not yet delivered
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn load_sample(path: &Path, width: u32, height: u32, mirror: bool) -> Result<RgbImage> {
    let bytes = std::fs::read(path).map_err(|e| StreamError::file_error(path, e))?;
    let mut image = image::load_from_memory(&bytes)
        .map_err(|e| StreamError::decode(format!("capture {}", path.display()), e))?
        .into_rgb8();

    if mirror {
        imageops::flip_horizontal_in_place(&mut image);
    }
    if image.dimensions() != (width, height) {
        image = imageops::resize(&image, width, height, FilterType::Triangle);
    }
    Ok(image)
}

#[async_trait::async_trait]
impl FrameSource for LiveCapture {
    async fn next_frame(&mut self, id: u64) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let (width, height, mirror) = (self.width, self.height, self.mirror);
        let image = tokio::task::spawn_blocking(move || load_sample(&path, width, height, mirror))
            .await
            .map_err(StreamError::task)??;

        Ok(Some(Frame::new(id, image, SystemTime::now())))
    }

    fn describe(&self) -> String {
        format!("capture {} ({}x{})", self.root.display(), self.width, self.height)
    }
}
