//! Producer side connection

use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::FrameCodec;
use crate::producer::{ProducerLoop, ProducerReport};
use crate::source::FrameSource;
use crate::transport::Listener;
use crate::{ProducerConfig, Result, StreamError};

/// A running producer loop bound to one consumer
pub struct ProducerConnection {
    peer: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<ProducerReport>>>,
}

impl ProducerConnection {
    /// Bind, wait for the consumer, then start streaming from `source`.
    pub async fn listen<S: FrameSource>(config: &ProducerConfig, source: S) -> Result<Self> {
        config.validate()?;
        let listener = Listener::bind(&config.host, config.port).await?;
        Self::accept(listener, config, source).await
    }

    /// Wait for the consumer on an already bound listener.
    pub async fn accept<S: FrameSource>(
        listener: Listener,
        config: &ProducerConfig,
        source: S,
    ) -> Result<Self> {
        let codec = FrameCodec::new(config.quality)?;
        let writer = listener.accept().await?;
        let peer = writer.peer_addr();

        let mut producer = ProducerLoop::new(source, codec, writer, config.frame_interval());
        if let Some(limit) = config.max_frames {
            producer = producer.with_max_frames(limit);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer.run(cancel.clone()));
        info!("Streaming to consumer at {}", peer);

        Ok(Self { peer, cancel, task: Some(task) })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Ask the loop to stop after the line in flight
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the loop to end
    pub async fn join(mut self) -> Result<ProducerReport> {
        match self.task.take() {
            Some(task) => task.await.map_err(StreamError::task)?,
            None => Err(StreamError::task("producer loop already joined")),
        }
    }
}

impl Drop for ProducerConnection {
    fn drop(&mut self) {
        debug!("Dropping producer connection");
        self.cancel.cancel();
    }
}
