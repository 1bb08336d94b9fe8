//! Per-frame processing: payload decode, transform, and sink.
//!
//! One [`FrameProcessor::process`] call turns one parsed wire line into
//! exactly one [`FrameResult`]. Every failure is caught here and becomes a
//! `Failure` result; nothing propagates to sibling frames or to the batch.

use image::RgbImage;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec::{self, from_text};
use crate::sink::Sink;
use crate::types::{FailureKind, FrameResult, Shape};
use crate::{ParseFailure, Result, WireMessage};

/// Reason recorded for every transform failure. Details go to the logs.
pub const TRANSFORM_ERROR: &str = "transform error";

/// Image-to-image operation applied to every decoded frame.
///
/// Implementations must be callable from several worker threads at once and
/// return an image with the same dimensions as their input.
pub trait Transform: Send + Sync + 'static {
    fn apply(&self, image: &RgbImage) -> Result<RgbImage>;
}

impl<F> Transform for F
where
    F: Fn(&RgbImage) -> Result<RgbImage> + Send + Sync + 'static,
{
    fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        self(image)
    }
}

/// Shared, immutable per-frame pipeline
#[derive(Clone)]
pub struct FrameProcessor {
    transform: Arc<dyn Transform>,
    sink: Arc<dyn Sink>,
}

impl std::fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor").finish_non_exhaustive()
    }
}

impl FrameProcessor {
    pub fn new(transform: impl Transform, sink: impl Sink) -> Self {
        Self { transform: Arc::new(transform), sink: Arc::new(sink) }
    }

    /// Build from already shared parts
    pub fn from_shared(transform: Arc<dyn Transform>, sink: Arc<dyn Sink>) -> Self {
        Self { transform, sink }
    }

    /// Process one parsed message on the blocking pool.
    pub async fn process(&self, parsed: std::result::Result<WireMessage, ParseFailure>) -> FrameResult {
        let message = match parsed {
            Ok(message) => message,
            Err(failure) => {
                return FrameResult::failure(failure.frame_id, FailureKind::Parse, failure.reason);
            }
        };

        let frame_id = message.frame_id;
        let transform = Arc::clone(&self.transform);
        let sink = Arc::clone(&self.sink);

        match tokio::task::spawn_blocking(move || run_pipeline(message, &*transform, &*sink)).await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(frame_id, "Frame worker failed: {}", e);
                FrameResult::failure(Some(frame_id), FailureKind::Transform, TRANSFORM_ERROR)
            }
        }
    }

    /// Process synchronously on the calling thread
    pub fn process_blocking(&self, message: WireMessage) -> FrameResult {
        run_pipeline(message, &*self.transform, &*self.sink)
    }
}

fn run_pipeline(message: WireMessage, transform: &dyn Transform, sink: &dyn Sink) -> FrameResult {
    let frame_id = message.frame_id;
    let decode_failure =
        |e: crate::StreamError| FrameResult::failure(Some(frame_id), FailureKind::Decode, e.to_string());

    let bytes = match from_text(&message.encoded_payload) {
        Ok(bytes) => bytes,
        Err(e) => return decode_failure(e),
    };
    let original = match codec::decode(&bytes) {
        Ok(image) => image,
        Err(e) => return decode_failure(e),
    };

    if original.dimensions() != (message.width, message.height) {
        warn!(
            frame_id,
            "Decoded {}x{} but the line declared {}x{}",
            original.width(),
            original.height(),
            message.width,
            message.height
        );
    }

    let processed = match catch_unwind(AssertUnwindSafe(|| transform.apply(&original))) {
        Ok(Ok(processed)) => processed,
        Ok(Err(e)) => {
            warn!(frame_id, "Transform failed: {}", e);
            return FrameResult::failure(Some(frame_id), FailureKind::Transform, TRANSFORM_ERROR);
        }
        Err(_) => {
            warn!(frame_id, "Transform panicked");
            return FrameResult::failure(Some(frame_id), FailureKind::Transform, TRANSFORM_ERROR);
        }
    };

    if processed.dimensions() != original.dimensions() {
        warn!(
            frame_id,
            "Transform changed dimensions from {:?} to {:?}",
            original.dimensions(),
            processed.dimensions()
        );
        return FrameResult::failure(Some(frame_id), FailureKind::Transform, TRANSFORM_ERROR);
    }

    match sink.write(frame_id, &processed) {
        Ok(output_location) => {
            debug!(frame_id, "Processed frame saved to {}", output_location);
            FrameResult::Success {
                frame_id,
                output_location,
                original_shape: Shape::of(&original),
                processed_shape: Shape::of(&processed),
            }
        }
        Err(e) => FrameResult::failure(Some(frame_id), FailureKind::Sink, e.to_string()),
    }
}
