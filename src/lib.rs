//! Line-delimited video frame streaming with windowed micro-batch processing.
//!
//! A producer acquires frames (live capture or a synthetic generator),
//! compresses them to JPEG, wraps them as base64 in one JSON object per line
//! and streams the lines over a single TCP connection. A consumer groups the
//! lines that arrive within each fixed time window into a batch, then decodes,
//! transforms and saves every frame on a bounded worker pool, reporting a
//! per-frame result and one summary per batch.
//!
//! # Features
//!
//! - **Failure isolation**: a malformed line or failing frame only affects
//!   its own result
//! - **Gap-free ids**: frame ids start at 0 and never skip
//! - **Cooperative shutdown**: both loops honour cancellation between frames
//!   and windows
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use framecast::processor::FrameProcessor;
//! use framecast::segment::{BackgroundRemover, SegmentationModel};
//! use framecast::sink::DirectorySink;
//! use framecast::{ConsumerConfig, Framecast};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> framecast::Result<()> {
//!     let config = ConsumerConfig::default();
//!     let model = SegmentationModel::load(&config.model_path)?;
//!     let sink = DirectorySink::create(&config.output_dir, config.output_quality)?;
//!     let processor = FrameProcessor::new(BackgroundRemover::new(model), sink);
//!
//!     let consumer = Framecast::dial(&config, processor).await?;
//!     let mut summaries = consumer.summaries();
//!     while let Some(summary) = summaries.next().await {
//!         println!("batch {}: {}", summary.sequence, summary);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub mod codec;
pub mod config;
pub mod connection;
pub mod ingest;
pub mod processor;
pub mod producer;
pub mod protocol;
pub mod segment;
pub mod sink;
pub mod source;
pub mod sources;
pub mod transport;
pub mod types;

// Core exports
pub use error::*;
pub use types::{Batch, BatchSummary, FailureKind, Frame, FrameResult, Shape, WireMessage};

pub use config::{ConsumerConfig, ProducerConfig};
pub use connection::{ConsumerConnection, ProducerConnection};
pub use ingest::SessionReport;
pub use producer::{ProducerReport, ProducerState};
pub use source::FrameSource;

use processor::FrameProcessor;

/// Entry point for both ends of a frame stream.
///
/// # Examples
///
/// ## Producer
/// ```rust,no_run
/// use framecast::{Framecast, ProducerConfig};
/// use framecast::sources::SyntheticGenerator;
///
/// #[tokio::main]
/// async fn main() -> framecast::Result<()> {
///     let config = ProducerConfig::default();
///     let source = SyntheticGenerator::new(config.width, config.height);
///     let producer = Framecast::listen(&config, source).await?;
///     let report = producer.join().await?;
///     println!("sent {} frames", report.frames_sent);
///     Ok(())
/// }
/// ```
pub struct Framecast;

impl Framecast {
    /// Bind the producer port, wait for one consumer, and start streaming.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The port cannot be bound
    /// - Accepting the consumer fails
    pub async fn listen<S: FrameSource>(config: &ProducerConfig, source: S) -> Result<ProducerConnection> {
        ProducerConnection::listen(config, source).await
    }

    /// Dial a producer and start batching its frames through `processor`.
    ///
    /// Retries while the producer is not listening, up to the configured
    /// connect timeout.
    pub async fn dial(config: &ConsumerConfig, processor: FrameProcessor) -> Result<ConsumerConnection> {
        ConsumerConnection::dial(config, processor).await
    }
}
