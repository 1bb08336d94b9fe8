//! Ingestion engine: windowed micro-batching of arriving wire lines.
//!
//! Two tasks cooperate per session:
//!
//! - the **window task** owns the connection's read half, closes a window
//!   every batch interval and hands each [`Batch`] to a bounded queue;
//! - the **dispatch task** takes batches in order, fans their messages out
//!   over the worker pool and publishes one [`BatchSummary`] per batch.
//!
//! Reading continues while a batch is being processed, so arrivals are never
//! stalled by slow frames (up to the queue depth).

mod dispatch;
pub mod window;

pub use dispatch::dispatch_batch;
pub use window::{Window, WindowExt, Windowed};

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::processor::FrameProcessor;
use crate::protocol::WireDefaults;
use crate::transport::Arrival;
use crate::types::{Batch, BatchSummary};
use crate::{Result, StreamError};

/// Summaries buffered for slow subscribers before they start lagging
const SUMMARY_CAPACITY: usize = 64;

/// Tuning for one ingestion session
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub batch_interval: Duration,
    pub defaults: WireDefaults,
    /// Frames processed concurrently, at least 1
    pub workers: usize,
    /// Completed batches allowed to wait for the dispatcher
    pub queue_depth: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_secs(2),
            defaults: WireDefaults::default(),
            workers: 4,
            queue_depth: 16,
        }
    }
}

/// Totals for a finished session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub batches: u64,
    pub frames: u64,
    pub succeeded: u64,
}

impl SessionReport {
    fn record(&mut self, summary: &BatchSummary) {
        self.batches += 1;
        self.frames += summary.total() as u64;
        self.succeeded += summary.succeeded() as u64;
    }
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} frames succeeded over {} batches", self.succeeded, self.frames, self.batches)
    }
}

/// Handles to a running ingestion session
pub struct IngestChannels {
    /// Publishes one summary per completed batch
    pub summaries: broadcast::Sender<Arc<BatchSummary>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    pub window_task: JoinHandle<Result<()>>,
    pub dispatch_task: JoinHandle<SessionReport>,
}

/// Spawns and wires the ingestion tasks
pub struct Ingest;

impl Ingest {
    /// Spawn the window and dispatch tasks over a stream of arrivals.
    pub fn spawn<S>(lines: S, processor: FrameProcessor, settings: IngestSettings) -> IngestChannels
    where
        S: Stream<Item = Result<Arrival>> + Send + 'static,
    {
        let (batch_tx, batch_rx) = mpsc::channel(settings.queue_depth.max(1));
        let (summaries, _) = broadcast::channel(SUMMARY_CAPACITY);
        let cancel = CancellationToken::new();

        let window_task = tokio::spawn(Self::window_task(
            lines,
            settings.batch_interval,
            batch_tx,
            cancel.clone(),
        ));

        let dispatch_task = tokio::spawn(Self::dispatch_task(
            batch_rx,
            Arc::new(processor),
            Arc::new(Semaphore::new(settings.workers.max(1))),
            settings.defaults,
            summaries.clone(),
            cancel.clone(),
        ));

        IngestChannels { summaries, cancel, window_task, dispatch_task }
    }

    /// Window task - groups arrivals into batches until the stream ends
    async fn window_task<S>(
        lines: S,
        period: Duration,
        batch_tx: mpsc::Sender<Batch>,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        S: Stream<Item = Result<Arrival>> + Send + 'static,
    {
        info!("Ingestion started with {:?} windows", period);
        let mut windows = std::pin::pin!(lines.windows(period));
        let mut sequence = 0u64;

        let outcome = loop {
            let window = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Ingestion cancelled");
                    break Ok(());
                }
                window = windows.next() => window,
            };

            let Some(window) = window else {
                info!("Producer closed the connection");
                break Ok(());
            };

            let mut batch = Batch::new(sequence, window.start);
            sequence += 1;

            let mut fault = None;
            for item in window.items {
                match item {
                    Ok(arrival) => batch.messages.push(arrival),
                    Err(e) => {
                        fault = Some(e);
                        break;
                    }
                }
            }

            debug!(batch = batch.sequence, count = batch.count(), "Window closed");
            if batch_tx.send(batch).await.is_err() {
                debug!("Dispatcher stopped, ending ingestion");
                break Ok(());
            }

            if let Some(e) = fault {
                break end_of_session(e);
            }
        };

        info!("Ingestion ended after {} windows", sequence);
        outcome
    }

    /// Dispatch task - processes batches strictly in window order
    async fn dispatch_task(
        mut batch_rx: mpsc::Receiver<Batch>,
        processor: Arc<FrameProcessor>,
        workers: Arc<Semaphore>,
        defaults: WireDefaults,
        summaries: broadcast::Sender<Arc<BatchSummary>>,
        cancel: CancellationToken,
    ) -> SessionReport {
        let mut report = SessionReport::default();

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = batch_rx.recv() => batch,
            };
            let Some(batch) = batch else { break };

            let summary = dispatch_batch(batch, &processor, &workers, &defaults).await;
            report.record(&summary);
            // No subscribers is fine
            let _ = summaries.send(Arc::new(summary));
        }

        info!("Session ended: {}", report);
        report
    }
}

/// Decide how a transport error ends the session
fn end_of_session(error: StreamError) -> Result<()> {
    match error.connection_kind() {
        Some(kind) if kind.is_disconnect() => {
            info!("Producer disconnected ({})", kind);
            Ok(())
        }
        Some(_) => {
            error!("Connection lost: {}", error);
            Err(error)
        }
        None => {
            warn!("Ingestion stopped: {}", error);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        CountingTransform, MemorySink, NEUTRAL_COLOUR, REJECTED_COLOUR, RejectReddish,
        solid_frame, wire_line,
    };
    use tokio_stream::wrappers::ReceiverStream;

    fn settings(batch_interval: Duration) -> IngestSettings {
        IngestSettings { batch_interval, workers: 2, ..IngestSettings::default() }
    }

    fn arrival(id: u64, colour: image::Rgb<u8>) -> Result<Arrival> {
        Ok(Ok(wire_line(&solid_frame(id, 16, 16, colour)).trim_end().to_string()))
    }

    #[tokio::test]
    async fn batch_scenario_reports_two_of_three() {
        let arrivals: Vec<_> = [(0, NEUTRAL_COLOUR), (1, REJECTED_COLOUR), (2, NEUTRAL_COLOUR)]
            .into_iter()
            .map(|(id, colour)| arrival(id, colour))
            .collect();

        let (tx, rx) = mpsc::channel(8);
        let processor = FrameProcessor::new(RejectReddish, MemorySink::default());
        let channels = Ingest::spawn(ReceiverStream::new(rx), processor, settings(Duration::from_millis(300)));
        let mut summaries = channels.summaries.subscribe();

        for arrival in arrivals {
            tx.send(arrival).await.unwrap();
        }

        let summary = loop {
            let summary = summaries.recv().await.unwrap();
            if summary.total() > 0 {
                break summary;
            }
        };
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.to_string(), "2/3 succeeded");
        let failed: Vec<_> = summary.failures().collect();
        assert_eq!(failed[0].frame_id(), Some(1));
        assert_eq!(failed[0].reason(), Some("transform error"));

        drop(tx);
        channels.window_task.await.unwrap().unwrap();
        let report = channels.dispatch_task.await.unwrap();
        assert_eq!((report.frames, report.succeeded), (3, 2));
    }

    #[tokio::test]
    async fn quiet_windows_produce_empty_summaries() {
        let (tx, rx) = mpsc::channel::<Result<Arrival>>(1);
        let transform = Arc::new(CountingTransform::default());
        let processor = FrameProcessor::from_shared(transform.clone(), Arc::new(MemorySink::default()));
        let channels = Ingest::spawn(ReceiverStream::new(rx), processor, settings(Duration::from_millis(50)));
        let mut summaries = channels.summaries.subscribe();

        let summary = summaries.recv().await.unwrap();
        assert_eq!(summary.to_string(), "0/0 succeeded");
        assert_eq!(transform.calls(), 0);

        drop(tx);
        channels.window_task.await.unwrap().unwrap();
        assert_eq!(channels.dispatch_task.await.unwrap().frames, 0);
    }

    #[tokio::test]
    async fn peer_reset_ends_the_session_normally() {
        let (tx, rx) = mpsc::channel(4);
        let processor = FrameProcessor::new(CountingTransform::default(), MemorySink::default());
        let channels = Ingest::spawn(ReceiverStream::new(rx), processor, settings(Duration::from_secs(60)));

        tx.send(arrival(0, NEUTRAL_COLOUR)).await.unwrap();
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        tx.send(Err(StreamError::connection("read frame line", reset))).await.unwrap();
        drop(tx);

        channels.window_task.await.unwrap().unwrap();
        let report = channels.dispatch_task.await.unwrap();
        assert_eq!((report.batches, report.frames, report.succeeded), (1, 1, 1));
    }

    #[tokio::test]
    async fn unexpected_connection_errors_fail_the_session() {
        let (tx, rx) = mpsc::channel(4);
        let processor = FrameProcessor::new(CountingTransform::default(), MemorySink::default());
        let channels = Ingest::spawn(ReceiverStream::new(rx), processor, settings(Duration::from_secs(60)));

        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        tx.send(Err(StreamError::connection("read frame line", timed_out))).await.unwrap();
        drop(tx);

        let err = channels.window_task.await.unwrap().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(channels.dispatch_task.await.unwrap().frames, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_both_tasks() {
        let (_tx, rx) = mpsc::channel::<Result<Arrival>>(1);
        let processor = FrameProcessor::new(CountingTransform::default(), MemorySink::default());
        let channels = Ingest::spawn(ReceiverStream::new(rx), processor, settings(Duration::from_secs(60)));

        channels.cancel.cancel();
        channels.window_task.await.unwrap().unwrap();
        assert_eq!(channels.dispatch_task.await.unwrap(), SessionReport::default());
    }
}
