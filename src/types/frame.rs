//! Frame type for the producer side

use image::RgbImage;
use std::time::SystemTime;

use crate::{Result, StreamError};

/// A single image sample.
///
/// Pixels are 8-bit RGB, row-major, `width * height * 3` bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Producer-assigned id, strictly increasing from 0 within a connection
    pub id: u64,

    /// Pixel buffer with its dimensions
    pub image: RgbImage,

    /// When the sample was acquired
    pub captured_at: SystemTime,
}

impl Frame {
    /// Create a frame from an owned image
    pub fn new(id: u64, image: RgbImage, captured_at: SystemTime) -> Self {
        Self { id, image, captured_at }
    }

    /// Create a frame from a raw RGB buffer.
    ///
    /// Fails with an encode error when the buffer length does not match
    /// `width * height * 3`.
    pub fn from_raw(
        id: u64,
        payload: Vec<u8>,
        width: u32,
        height: u32,
        captured_at: SystemTime,
    ) -> Result<Self> {
        let len = payload.len();
        let image = RgbImage::from_raw(width, height, payload).ok_or_else(|| {
            StreamError::encode(format!(
                "buffer of {} bytes does not match {}x{}x3",
                len, width, height
            ))
        })?;
        Ok(Self { id, image, captured_at })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw pixel bytes
    pub fn payload(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Image shape as `(height, width, channels)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub height: u32,
    pub width: u32,
    pub channels: u8,
}

impl Shape {
    /// Shape of an RGB image
    pub fn of(image: &RgbImage) -> Self {
        Self { height: image.height(), width: image.width(), channels: 3 }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}
