//! framecast-producer - stream frames to a single consumer.
//!
//! Binds the configured port, waits for one consumer, then sends one frame
//! per interval until the source runs dry, the consumer leaves, or Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecast::sources::open_source;
use framecast::{Framecast, ProducerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream video frames to one framecast consumer")]
struct Args {
    /// YAML configuration file.
    #[arg(long, env = "FRAMECAST_PRODUCER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,

    /// Frame width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// JPEG quality (0-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Seconds to wait after each frame.
    #[arg(long)]
    interval: Option<f64>,

    /// Capture directory of still images; synthetic frames when unusable.
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Do not mirror captured frames.
    #[arg(long)]
    no_mirror: bool,

    /// Stop after sending this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Log filter, e.g. `info` or `framecast=debug`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<ProducerConfig> {
        let mut config = match &self.config {
            Some(path) => ProducerConfig::from_yaml_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ProducerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(interval) = self.interval {
            config.frame_interval_secs = interval;
        }
        if self.capture.is_some() {
            config.capture = self.capture;
        }
        if self.no_mirror {
            config.mirror = false;
        }
        if self.max_frames.is_some() {
            config.max_frames = self.max_frames;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());
    let config = args.into_config()?;

    let source = open_source(&config);
    let producer = tokio::select! {
        producer = Framecast::listen(&config, source) => producer.context("failed to start producer")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted before a consumer connected");
            return Ok(());
        }
    };

    let cancel = producer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping producer...");
            cancel.cancel();
        }
    });

    match producer.join().await {
        Ok(report) => {
            info!("Done: {} frames, {} bytes sent", report.frames_sent, report.bytes_sent);
            Ok(())
        }
        Err(e) if e.connection_kind().is_some_and(|kind| kind.is_disconnect()) => {
            info!("Consumer disconnected, exiting");
            Ok(())
        }
        Err(e) => {
            for hint in e.recovery_suggestions() {
                warn!("Hint: {}", hint);
            }
            Err(e.into())
        }
    }
}
