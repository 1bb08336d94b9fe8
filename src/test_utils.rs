//! Shared fixtures for unit tests, integration tests and benchmarks

#![cfg(any(test, feature = "benchmark"))]

use image::{Rgb, RgbImage};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::codec::FrameCodec;
use crate::processor::Transform;
use crate::sink::Sink;
use crate::source::FrameSource;
use crate::{Frame, Result, StreamError, protocol};

/// Colour that [`RejectReddish`] refuses to process
pub const REJECTED_COLOUR: Rgb<u8> = Rgb([250, 10, 10]);
/// Neutral colour accepted by every test transform
pub const NEUTRAL_COLOUR: Rgb<u8> = Rgb([100, 100, 100]);

/// Frame with a diagonal gradient, a realistic JPEG workload
pub fn gradient_frame(id: u64, width: u32, height: u32) -> Frame {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, r.wrapping_add(g) / 2])
    });
    Frame::new(id, image, SystemTime::now())
}

/// Frame filled with one colour
pub fn solid_frame(id: u64, width: u32, height: u32, colour: Rgb<u8>) -> Frame {
    Frame::new(id, RgbImage::from_pixel(width, height, colour), SystemTime::now())
}

/// Delimiter-terminated wire line for a frame, encoded at default quality
pub fn wire_line(frame: &Frame) -> String {
    let message = FrameCodec::default().to_wire(frame).expect("test frame should encode");
    protocol::serialize(&message)
}

fn mean_colour(image: &RgbImage) -> [f32; 3] {
    let mut sum = [0f64; 3];
    for pixel in image.pixels() {
        for (acc, channel) in sum.iter_mut().zip(pixel.0) {
            *acc += f64::from(channel);
        }
    }
    let n = f64::from(image.width() * image.height()).max(1.0);
    sum.map(|s| (s / n) as f32)
}

fn is_reddish(image: &RgbImage) -> bool {
    let [r, g, b] = mean_colour(image);
    r > 180.0 && g < 80.0 && b < 80.0
}

/// Identity transform that counts its invocations
#[derive(Debug, Default)]
pub struct CountingTransform {
    calls: AtomicUsize,
}

impl CountingTransform {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transform for CountingTransform {
    fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(image.clone())
    }
}

/// Identity transform that fails on frames of [`REJECTED_COLOUR`]
#[derive(Debug, Default)]
pub struct RejectReddish;

impl Transform for RejectReddish {
    fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        if is_reddish(image) {
            return Err(StreamError::transform("model rejected a red frame"));
        }
        Ok(image.clone())
    }
}

/// Identity transform that panics on frames of [`REJECTED_COLOUR`]
#[derive(Debug, Default)]
pub struct PanicOnReddish;

impl Transform for PanicOnReddish {
    fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        if is_reddish(image) {
            panic!("segmentation model crashed");
        }
        Ok(image.clone())
    }
}

/// Sink keeping every written image in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    images: Mutex<BTreeMap<u64, RgbImage>>,
}

impl MemorySink {
    /// Ids written so far, ascending
    pub fn saved_ids(&self) -> Vec<u64> {
        self.images.lock().map(|images| images.keys().copied().collect()).unwrap_or_default()
    }

    pub fn get(&self, frame_id: u64) -> Option<RgbImage> {
        self.images.lock().ok()?.get(&frame_id).cloned()
    }
}

impl Sink for MemorySink {
    fn write(&self, frame_id: u64, image: &RgbImage) -> Result<String> {
        let location = format!("memory://frame_{:04}", frame_id);
        let mut images = self
            .images
            .lock()
            .map_err(|_| StreamError::sink(location.clone(), "memory sink poisoned"))?;
        images.insert(frame_id, image.clone());
        Ok(location)
    }
}

/// One scripted acquisition: an image, or a failed read
pub type Scripted = std::result::Result<RgbImage, String>;

/// Source replaying a fixed script, then reporting exhaustion
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Scripted>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self { script: script.into_iter().collect() }
    }

    /// Script of solid frames in the given colours
    pub fn solid(width: u32, height: u32, colours: &[Rgb<u8>]) -> Self {
        Self::new(colours.iter().map(|&c| Ok(RgbImage::from_pixel(width, height, c))))
    }
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self, id: u64) -> Result<Option<Frame>> {
        match self.script.pop_front() {
            Some(Ok(image)) => Ok(Some(Frame::new(id, image, SystemTime::now()))),
            Some(Err(reason)) => Err(StreamError::decode("scripted sample", reason)),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("scripted source ({} left)", self.script.len())
    }
}
