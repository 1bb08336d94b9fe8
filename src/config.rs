//! Producer and consumer configuration.
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! command-line overrides. Call `validate()` before use.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::FrameCodec;
use crate::protocol::WireDefaults;
use crate::sink::DEFAULT_OUTPUT_QUALITY;
use crate::transport::DEFAULT_MAX_LINE_BYTES;
use crate::{Result, StreamError};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6100;

/// Interval between dial attempts while the producer is not listening yet
pub const DIAL_RETRY_INTERVAL: Duration = Duration::from_millis(500);

fn load_yaml<T: DeserializeOwned>(text: &str, origin: &str) -> Result<T> {
    serde_yaml_ng::from_str(text).map_err(|e| StreamError::config(format!("{}: {}", origin, e)))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| StreamError::file_error(path, e))?;
    load_yaml(&text, &path.display().to_string())
}

fn seconds(field: &str, value: f64, allow_zero: bool) -> Result<Duration> {
    let valid = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if !valid {
        return Err(StreamError::config(format!("{} must be a positive number, got {}", field, value)));
    }
    Duration::try_from_secs_f64(value).map_err(|e| StreamError::config(format!("{}: {}", field, e)))
}

fn check_dimensions(what: &str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(StreamError::config(format!("{} must be non-zero, got {}x{}", what, width, height)));
    }
    let limit = u32::from(u16::MAX);
    if width > limit || height > limit {
        return Err(StreamError::config(format!(
            "{} must be at most {}x{}, got {}x{}",
            what, limit, limit, width, height
        )));
    }
    Ok(())
}

fn check_quality(field: &str, quality: u8) -> Result<()> {
    if quality > 100 {
        return Err(StreamError::config(format!("{} must be within 0..=100, got {}", field, quality)));
    }
    Ok(())
}

/// Producer side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerConfig {
    pub host: String,
    pub port: u16,
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 0..=100
    pub quality: u8,
    /// Pause after each sent frame
    pub frame_interval_secs: f64,
    /// Capture directory; synthetic frames when absent or unusable
    pub capture: Option<PathBuf>,
    /// Mirror captured frames horizontally
    pub mirror: bool,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            width: 640,
            height: 480,
            quality: FrameCodec::DEFAULT_QUALITY,
            frame_interval_secs: 2.0,
            capture: None,
            mirror: true,
            max_frames: None,
        }
    }
}

impl ProducerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        load_yaml(text, "producer config")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        read_yaml(path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StreamError::config("host must not be empty"));
        }
        check_dimensions("frame size", self.width, self.height)?;
        check_quality("quality", self.quality)?;
        seconds("frame_interval_secs", self.frame_interval_secs, true)?;
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.frame_interval_secs).unwrap_or(Duration::ZERO)
    }
}

/// Consumer side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    pub host: String,
    pub port: u16,
    /// Length of one batching window
    pub batch_interval_secs: f64,
    /// Worker pool size; 0 picks the available parallelism
    pub workers: usize,
    /// Assumed for lines without `width`
    pub default_width: u32,
    /// Assumed for lines without `height`
    pub default_height: u32,
    /// Longer lines are rejected as parse failures
    pub max_line_bytes: usize,
    pub output_dir: PathBuf,
    /// JPEG quality of saved frames
    pub output_quality: u8,
    pub model_path: PathBuf,
    /// How long to keep dialling a producer that is not listening yet
    pub connect_timeout_secs: f64,
    /// Completed batches allowed to wait for processing
    pub queue_depth: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            batch_interval_secs: 2.0,
            workers: 0,
            default_width: 640,
            default_height: 480,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            output_dir: PathBuf::from("output_frames"),
            output_quality: DEFAULT_OUTPUT_QUALITY,
            model_path: PathBuf::from("segmenter.yaml"),
            connect_timeout_secs: 30.0,
            queue_depth: 16,
        }
    }
}

impl ConsumerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        load_yaml(text, "consumer config")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        read_yaml(path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StreamError::config("host must not be empty"));
        }
        seconds("batch_interval_secs", self.batch_interval_secs, false)?;
        seconds("connect_timeout_secs", self.connect_timeout_secs, true)?;
        check_dimensions("default frame size", self.default_width, self.default_height)?;
        check_quality("output_quality", self.output_quality)?;
        if self.max_line_bytes == 0 {
            return Err(StreamError::config("max_line_bytes must be positive"));
        }
        if self.queue_depth == 0 {
            return Err(StreamError::config("queue_depth must be positive"));
        }
        Ok(())
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.batch_interval_secs).unwrap_or(Duration::from_secs(2))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs).unwrap_or(Duration::ZERO)
    }

    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            n => n,
        }
    }

    /// Fallbacks for fields missing from wire lines
    pub fn wire_defaults(&self) -> WireDefaults {
        WireDefaults { frame_id: 0, width: self.default_width, height: self.default_height }
    }
}
