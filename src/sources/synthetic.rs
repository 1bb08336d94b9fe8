//! Synthetic frame generator used when no capture is available

use image::{Rgb, RgbImage};
use std::time::SystemTime;

use crate::source::FrameSource;
use crate::types::unix_seconds;
use crate::{Frame, Result};

/// Side of one frame-id marker block, in pixels
const MARKER_BLOCK: u32 = 8;
/// Number of id bits drawn into the marker row
const MARKER_BITS: u32 = 16;

/// Generates solid frames whose colour drifts with wall-clock time.
///
/// The low bits of the frame id are drawn as a row of white blocks in the
/// top-left corner so frames stay distinguishable after processing.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    width: u32,
    height: u32,
}

impl SyntheticGenerator {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Render the frame for `id` at time `at`
    pub fn render(&self, id: u64, at: SystemTime) -> RgbImage {
        let shift = ((unix_seconds(at) * 50.0) % 255.0) as u8;
        let background = Rgb([200 - shift / 2, 100, shift]);
        let mut image = RgbImage::from_pixel(self.width, self.height, background);

        for bit in 0..MARKER_BITS {
            let on = (id >> bit) & 1 == 1;
            let colour = if on { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) };
            let x0 = MARKER_BLOCK + bit * (MARKER_BLOCK + 2);
            let y0 = MARKER_BLOCK;
            for y in y0..(y0 + MARKER_BLOCK).min(self.height) {
                for x in x0..(x0 + MARKER_BLOCK).min(self.width) {
                    image.put_pixel(x, y, colour);
                }
            }
        }
        image
    }
}

#[async_trait::async_trait]
impl FrameSource for SyntheticGenerator {
    async fn next_frame(&mut self, id: u64) -> Result<Option<Frame>> {
        let now = SystemTime::now();
        Ok(Some(Frame::new(id, self.render(id, now), now)))
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{} generator", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn colour_drifts_with_time() {
        let generator = SyntheticGenerator::new(200, 40);
        let at = UNIX_EPOCH + Duration::from_millis(1_000);
        let image = generator.render(0, at);

        // shift = (1.0 * 50) % 255 = 50
        assert_eq!(image.get_pixel(199, 39), &Rgb([175, 100, 50]));
    }

    #[test]
    fn marker_encodes_frame_id_bits() {
        let generator = SyntheticGenerator::new(200, 40);
        let image = generator.render(0b101, UNIX_EPOCH);

        let block = |bit: u32| image.get_pixel(MARKER_BLOCK + bit * (MARKER_BLOCK + 2) + 1, 9);
        assert_eq!(block(0), &Rgb([255, 255, 255]));
        assert_eq!(block(1), &Rgb([0, 0, 0]));
        assert_eq!(block(2), &Rgb([255, 255, 255]));
    }

    #[test]
    fn tiny_frames_clip_the_marker() {
        let image = SyntheticGenerator::new(4, 4).render(u64::MAX, UNIX_EPOCH);
        assert_eq!(image.dimensions(), (4, 4));
    }

    #[tokio::test]
    async fn frames_carry_requested_id() {
        let mut generator = SyntheticGenerator::new(16, 16);
        let frame = generator.next_frame(12).await.unwrap().unwrap();
        assert_eq!(frame.id, 12);
        assert_eq!((frame.width(), frame.height()), (16, 16));
    }
}
