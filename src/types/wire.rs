//! Wire message type

use std::time::{SystemTime, UNIX_EPOCH};

/// The encoded-on-wire form of one [`Frame`](super::Frame).
///
/// `encoded_payload` is base64 text of a JPEG stream and never contains the
/// line delimiter.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub frame_id: u64,
    pub encoded_payload: String,
    pub width: u32,
    pub height: u32,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

/// Seconds since the Unix epoch as a float; times before the epoch map to 0.
pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
