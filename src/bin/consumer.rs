//! framecast-consumer - batch, segment and save frames from a producer.
//!
//! Dials the producer, groups arriving frames into fixed windows, removes
//! their background and writes the results to the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecast::processor::FrameProcessor;
use framecast::segment::{BackgroundRemover, SegmentationModel};
use framecast::sink::DirectorySink;
use framecast::{ConsumerConfig, Framecast};

#[derive(Parser, Debug)]
#[command(author, version, about = "Receive, batch and segment frames from a framecast producer")]
struct Args {
    /// YAML configuration file.
    #[arg(long, env = "FRAMECAST_CONSUMER_CONFIG")]
    config: Option<PathBuf>,

    /// Producer host.
    #[arg(long)]
    host: Option<String>,

    /// Producer port.
    #[arg(long)]
    port: Option<u16>,

    /// Seconds per batching window.
    #[arg(long)]
    batch_interval: Option<f64>,

    /// Frames processed in parallel (0 = all cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Directory for processed frames.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Segmentation model file.
    #[arg(long, env = "FRAMECAST_MODEL")]
    model: Option<PathBuf>,

    /// Seconds to keep dialling a producer that is not up yet.
    #[arg(long)]
    connect_timeout: Option<f64>,

    /// Log filter, e.g. `info` or `framecast=debug`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<ConsumerConfig> {
        let mut config = match &self.config {
            Some(path) => ConsumerConfig::from_yaml_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ConsumerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(interval) = self.batch_interval {
            config.batch_interval_secs = interval;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout_secs = timeout;
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

    // Model and sink are set up before connecting; failures here are fatal
    let model = SegmentationModel::load(&config.model_path)
        .context("failed to load segmentation model")?;
    let sink = DirectorySink::create(&config.output_dir, config.output_quality)?;
    let processor = FrameProcessor::new(BackgroundRemover::new(model), sink);

    let consumer = tokio::select! {
        consumer = Framecast::dial(&config, processor) => consumer.context("failed to reach producer")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted before connecting");
            return Ok(());
        }
    };

    let cancel = consumer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping after the current batch...");
            cancel.cancel();
        }
    });

    match consumer.join().await {
        Ok(report) => {
            info!("Done: {}", report);
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
