//! Consumer side connection

use futures::StreamExt;
use futures::stream::BoxStream;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DIAL_RETRY_INTERVAL;
use crate::ingest::{Ingest, IngestSettings, SessionReport};
use crate::processor::FrameProcessor;
use crate::transport::{self, FrameReader};
use crate::types::BatchSummary;
use crate::{ConsumerConfig, Result, StreamError};

/// A running ingestion session reading from one producer
pub struct ConsumerConnection {
    peer: SocketAddr,
    summaries: broadcast::WeakSender<Arc<BatchSummary>>,
    cancel: CancellationToken,
    window_task: Option<JoinHandle<Result<()>>>,
    dispatch_task: Option<JoinHandle<SessionReport>>,
}

impl ConsumerConnection {
    /// Dial the producer, waiting up to the connect timeout for it to listen.
    pub async fn dial(config: &ConsumerConfig, processor: FrameProcessor) -> Result<Self> {
        config.validate()?;
        let reader = transport::dial_with_retry(
            &config.host,
            config.port,
            config.max_line_bytes,
            config.connect_timeout(),
            DIAL_RETRY_INTERVAL,
        )
        .await?;
        Ok(Self::start(reader, config, processor))
    }

    /// Start ingestion over an established connection.
    pub fn start(reader: FrameReader, config: &ConsumerConfig, processor: FrameProcessor) -> Self {
        let peer = reader.peer_addr();
        let settings = IngestSettings {
            batch_interval: config.batch_interval(),
            defaults: config.wire_defaults(),
            workers: config.worker_count(),
            queue_depth: config.queue_depth,
        };
        info!(
            "Batching every {:?} with {} workers",
            settings.batch_interval, settings.workers
        );

        let channels = Ingest::spawn(reader, processor, settings);
        Self {
            peer,
            summaries: channels.summaries.downgrade(),
            cancel: channels.cancel,
            window_task: Some(channels.window_task),
            dispatch_task: Some(channels.dispatch_task),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Batch summaries published from now on.
    ///
    /// The stream ends once the session is over. A subscriber that falls too
    /// far behind skips the summaries it missed.
    pub fn summaries(&self) -> BoxStream<'static, Arc<BatchSummary>> {
        // Only the dispatch task holds a strong sender
        match self.summaries.upgrade() {
            Some(sender) => BroadcastStream::new(sender.subscribe())
                .filter_map(|item| async move { item.ok() })
                .boxed(),
            None => futures::stream::empty().boxed(),
        }
    }

    /// Stop reading new windows; the batch being processed still completes
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the session to end and return its totals.
    ///
    /// A producer that disconnects ends the session normally. Other
    /// connection failures are returned after queued batches are processed.
    pub async fn join(mut self) -> Result<SessionReport> {
        let (Some(window_task), Some(dispatch_task)) =
            (self.window_task.take(), self.dispatch_task.take())
        else {
            return Err(StreamError::task("consumer session already joined"));
        };

        let ingestion = window_task.await.map_err(StreamError::task)?;
        let report = dispatch_task.await.map_err(StreamError::task)?;
        ingestion.map(|()| report)
    }
}

impl Drop for ConsumerConnection {
    fn drop(&mut self) {
        debug!("Dropping consumer connection");
        self.cancel.cancel();
    }
}
