//! Frame codec: lossy JPEG compression plus a text-safe encoding.
//!
//! The producer turns a [`Frame`] into a [`WireMessage`] with
//! [`FrameCodec::to_wire`]; the consumer reverses it with [`from_text`] and
//! [`FrameCodec::decode`].
//!
//! ```rust
//! use framecast::codec::{FrameCodec, from_text, to_text};
//! use framecast::Frame;
//! use std::time::SystemTime;
//!
//! let codec = FrameCodec::new(80).unwrap();
//! let frame = Frame::from_raw(0, vec![90u8; 16 * 8 * 3], 16, 8, SystemTime::now()).unwrap();
//!
//! let bytes = codec.encode(&frame).unwrap();
//! let text = to_text(&bytes);
//! let decoded = codec.decode(&from_text(&text).unwrap()).unwrap();
//! assert_eq!(decoded.dimensions(), (16, 8));
//! ```

mod text;

pub use text::{from_text, to_text};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use tracing::trace;

use crate::types::unix_seconds;
use crate::{Frame, Result, StreamError, WireMessage};

/// Largest dimension a baseline JPEG stream can describe
const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// JPEG frame codec with a fixed quality level.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    quality: u8,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self { quality: Self::DEFAULT_QUALITY }
    }
}

impl FrameCodec {
    pub const DEFAULT_QUALITY: u8 = 80;

    /// Create a codec; `quality` must be within 0..=100.
    pub fn new(quality: u8) -> Result<Self> {
        if quality > 100 {
            return Err(StreamError::config(format!(
                "compression quality must be within 0..=100, got {}",
                quality
            )));
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress a frame into a JPEG byte stream.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        self.encode_image(&frame.image)
    }

    /// Compress an RGB image into a JPEG byte stream.
    pub fn encode_image(&self, image: &RgbImage) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(StreamError::encode(format!("empty image {}x{}", width, height)));
        }
        if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
            return Err(StreamError::encode(format!(
                "image {}x{} exceeds the JPEG limit of {}",
                width, height, MAX_JPEG_DIMENSION
            )));
        }

        // The encoder treats quality 0 as its minimum of 1
        let quality = self.quality.max(1);
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(image)
            .map_err(|e| StreamError::encode(e.to_string()))?;

        if buffer.is_empty() {
            return Err(StreamError::encode("encoder produced no output"));
        }

        trace!(width, height, quality, bytes = buffer.len(), "Encoded frame");
        Ok(buffer)
    }

    /// Decompress a JPEG byte stream into an RGB image.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        decode(bytes)
    }

    /// Encode a frame and wrap it into a wire message.
    pub fn to_wire(&self, frame: &Frame) -> Result<WireMessage> {
        let bytes = self.encode(frame)?;
        Ok(WireMessage {
            frame_id: frame.id,
            encoded_payload: to_text(&bytes),
            width: frame.width(),
            height: frame.height(),
            timestamp: unix_seconds(frame.captured_at),
        })
    }
}

/// Decompress a JPEG byte stream into an RGB image.
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(StreamError::decode("image", "empty payload"));
    }
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| StreamError::decode("image", e))?;
    Ok(image.into_rgb8())
}
