//! Line-delimited wire protocol.
//!
//! Every message is one JSON object on one line, terminated by a single `\n`:
//!
//! ```text
//! {"frame_id":0,"data":"/9j/4AAQ...","timestamp":1718000000.25,"width":640,"height":480}
//! ```
//!
//! The delimiter is the only message boundary. JSON string escaping and the
//! base64 payload alphabet guarantee it never appears inside a message.
//! Missing `frame_id`, `width` and `height` fall back to [`WireDefaults`];
//! a missing `data` field becomes an empty payload, which later fails to
//! decode for that frame only.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ParseFailure, WireMessage};

/// The message delimiter
pub const DELIMITER: u8 = b'\n';

/// Values used for fields missing from a wire line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireDefaults {
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for WireDefaults {
    fn default() -> Self {
        Self { frame_id: 0, width: 640, height: 480 }
    }
}

/// Loosely typed view of one line; every field is optional
#[derive(Debug, Deserialize)]
struct WireLine {
    frame_id: Option<u64>,
    data: Option<String>,
    timestamp: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Serialize a message to one delimiter-terminated line.
pub fn serialize(message: &WireMessage) -> String {
    let record = json!({
        "frame_id": message.frame_id,
        "data": message.encoded_payload,
        "timestamp": message.timestamp,
        "width": message.width,
        "height": message.height,
    });
    let mut line = record.to_string();
    line.push(DELIMITER as char);
    line
}

/// Parse one line (with or without its trailing delimiter).
///
/// Never panics; any malformed input becomes a [`ParseFailure`] carrying the
/// raw line and, when recoverable, the frame id.
pub fn parse(line: &str, defaults: &WireDefaults) -> Result<WireMessage, ParseFailure> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.trim().is_empty() {
        return Err(ParseFailure::new(trimmed, "empty line"));
    }

    let record: WireLine = serde_json::from_str(trimmed).map_err(|e| {
        ParseFailure::new(trimmed, e.to_string()).with_frame_id(recover_frame_id(trimmed))
    })?;

    Ok(WireMessage {
        frame_id: record.frame_id.unwrap_or(defaults.frame_id),
        encoded_payload: record.data.unwrap_or_default(),
        width: record.width.unwrap_or(defaults.width),
        height: record.height.unwrap_or(defaults.height),
        timestamp: record.timestamp.unwrap_or(0.0),
    })
}

/// Best-effort frame id from a line that failed strict parsing
fn recover_frame_id(line: &str) -> Option<u64> {
    serde_json::from_str::<Value>(line).ok()?.get("frame_id")?.as_u64()
}
