//! Producer loop: acquire, encode, send, pace.
//!
//! ```text
//! Idle -> Sourcing -> Encoding -> Sending -> Pacing -> Sourcing ...
//!            |            |           |          |
//!            |            +- skip ----+          +- cancel -> Stopped
//!            +- exhausted / cancel -> Stopped
//!            +- too many errors ----> Faulted
//!                                     Sending error -> Faulted
//! ```
//!
//! Frame ids start at 0 and advance only after a successful send, so the
//! consumer sees a gap-free sequence.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::FrameCodec;
use crate::protocol;
use crate::source::FrameSource;
use crate::transport::FrameWriter;
use crate::{Result, StreamError};

/// Consecutive source or encode failures tolerated before the loop faults
const MAX_FAILURES: u32 = 10;

/// Exponential backoff after the n-th consecutive failure: 50ms, 100ms, 200ms, ...
fn backoff(failures: u32) -> Duration {
    Duration::from_millis(50 << failures.saturating_sub(1).min(5))
}

/// Producer loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Idle,
    Sourcing,
    Encoding,
    Sending,
    Pacing,
    Stopped,
    Faulted,
}

/// Totals reported when the loop ends normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerReport {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub state: ProducerState,
}

/// Owns the source, codec and write half of the connection
pub struct ProducerLoop<S: FrameSource> {
    source: S,
    codec: FrameCodec,
    writer: FrameWriter,
    frame_interval: Duration,
    max_frames: Option<u64>,
    state: ProducerState,
}

impl<S: FrameSource> ProducerLoop<S> {
    pub fn new(source: S, codec: FrameCodec, writer: FrameWriter, frame_interval: Duration) -> Self {
        Self { source, codec, writer, frame_interval, max_frames: None, state: ProducerState::Idle }
    }

    /// Stop after `limit` frames have been sent
    pub fn with_max_frames(mut self, limit: u64) -> Self {
        self.max_frames = Some(limit);
        self
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    fn enter(&mut self, state: ProducerState) {
        if self.state != state {
            debug!("Producer {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run until the source is exhausted, `cancel` fires, or a fatal error.
    ///
    /// Cancellation is honoured while acquiring a frame and while pacing; a
    /// line already being written is always completed. The connection is
    /// closed on every exit path.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<ProducerReport> {
        info!(
            "Producer loop started: {} -> {} every {:?}",
            self.source.describe(),
            self.writer.peer_addr(),
            self.frame_interval
        );

        let started = Instant::now();
        let mut next_id = 0u64;
        let mut failures = 0u32;

        let outcome: Result<()> = loop {
            if cancel.is_cancelled() {
                info!("Producer cancelled");
                break Ok(());
            }
            if self.max_frames.is_some_and(|limit| next_id >= limit) {
                info!("Frame limit of {} reached", next_id);
                break Ok(());
            }

            self.enter(ProducerState::Sourcing);
            let acquired = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Producer cancelled while acquiring a frame");
                    break Ok(());
                }
                acquired = self.source.next_frame(next_id) => acquired,
            };

            let frame = match acquired {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Frame source exhausted after {} frames", next_id);
                    break Ok(());
                }
                Err(e) => {
                    failures += 1;
                    warn!("Frame source error ({}/{}): {}", failures, MAX_FAILURES, e);
                    if failures >= MAX_FAILURES {
                        error!("Too many frame source errors, stopping producer");
                        break Err(e);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(backoff(failures)) => {}
                    }
                    continue;
                }
            };

            self.enter(ProducerState::Encoding);
            let message = match self.codec.to_wire(&frame) {
                Ok(message) => message,
                Err(e) => {
                    failures += 1;
                    warn!("Skipping frame #{} ({}/{}): {}", next_id, failures, MAX_FAILURES, e);
                    if failures >= MAX_FAILURES {
                        error!("Too many encode failures, stopping producer");
                        break Err(e);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(backoff(failures)) => {}
                    }
                    continue;
                }
            };
            failures = 0;
            drop(frame);

            self.enter(ProducerState::Sending);
            let line = protocol::serialize(&message);
            let size = line.len();
            if let Err(e) = self.writer.send_line(line).await {
                break Err(e);
            }
            info!(
                "Sent frame #{} | elapsed {:.1}s | size {} bytes",
                next_id,
                started.elapsed().as_secs_f64(),
                size
            );
            next_id += 1;

            self.enter(ProducerState::Pacing);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Producer cancelled while pacing");
                    break Ok(());
                }
                _ = tokio::time::sleep(self.frame_interval) => {}
            }
        };

        let bytes_sent = self.writer.bytes_sent();
        let closed = self.writer.close().await;

        match outcome {
            Ok(()) => {
                self.state = ProducerState::Stopped;
                closed?;
                info!("Producer stopped: {} frames, {} bytes sent", next_id, bytes_sent);
                Ok(ProducerReport { frames_sent: next_id, bytes_sent, state: self.state })
            }
            Err(e) => {
                self.state = ProducerState::Faulted;
                if let Err(close_error) = closed {
                    debug!("Close after fault failed: {}", close_error);
                }
                report_fault(&e, next_id);
                Err(e)
            }
        }
    }
}

fn report_fault(error: &StreamError, frames_sent: u64) {
    match error.connection_kind() {
        Some(kind) if kind.is_disconnect() => {
            info!("Consumer disconnected ({}) after {} frames", kind, frames_sent)
        }
        _ => error!("Producer faulted after {} frames: {}", frames_sent, error),
    }
}
