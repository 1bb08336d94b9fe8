//! Core data types flowing through the pipeline.
//!
//! - [`Frame`] is one image sample, owned by the producer until encoded.
//! - [`WireMessage`] is the encoded, line-serialisable form of a frame.
//! - [`Batch`] groups raw wire lines completed within one time window.
//! - [`FrameResult`] is the outcome of processing exactly one wire line.
//! - [`BatchSummary`] aggregates the results of one batch.
//!
//! ```rust
//! use framecast::types::{Frame, Shape};
//! use std::time::SystemTime;
//!
//! let frame = Frame::from_raw(0, vec![0u8; 4 * 2 * 3], 4, 2, SystemTime::now()).unwrap();
//! assert_eq!(Shape::of(&frame.image), Shape { height: 2, width: 4, channels: 3 });
//! ```

mod batch;
mod frame;
mod outcome;
mod wire;

pub use batch::Batch;
pub use frame::{Frame, Shape};
pub use outcome::{BatchSummary, FailureKind, FrameResult};
pub use wire::{WireMessage, unix_seconds};
