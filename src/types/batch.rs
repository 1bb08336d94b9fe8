//! Batch of wire lines collected during one window

use std::time::SystemTime;

use crate::protocol::{self, WireDefaults};
use crate::{ParseFailure, WireMessage};

/// Wire lines whose delimiter arrived within one time window.
///
/// Arrival order is preserved. Lines rejected by the transport (for example
/// oversized lines) are kept in place as [`ParseFailure`]s so they are still
/// reported exactly once.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Sequence number of the window within the session, from 0
    pub sequence: u64,
    /// Wall-clock start of the window
    pub window_start: SystemTime,
    /// Raw lines in arrival order
    pub messages: Vec<Result<String, ParseFailure>>,
}

impl Batch {
    /// Create an empty batch for a window
    pub fn new(sequence: u64, window_start: SystemTime) -> Self {
        Self { sequence, window_start, messages: Vec::new() }
    }

    /// Number of messages in the batch
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Parse every message independently, preserving arrival order.
    ///
    /// A malformed line yields a [`ParseFailure`] in its slot; it never
    /// affects its siblings.
    pub fn parse_all(self, defaults: &WireDefaults) -> Vec<Result<WireMessage, ParseFailure>> {
        self.messages
            .into_iter()
            .map(|line| line.and_then(|line| protocol::parse(&line, defaults)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::serialize;

    fn message(frame_id: u64) -> WireMessage {
        WireMessage {
            frame_id,
            encoded_payload: "AAAA".to_string(),
            width: 4,
            height: 2,
            timestamp: 1.5,
        }
    }

    #[test]
    fn empty_batch_counts_zero() {
        let batch = Batch::new(0, SystemTime::now());
        assert_eq!(batch.count(), 0);
        assert!(batch.is_empty());
        assert!(batch.parse_all(&WireDefaults::default()).is_empty());
    }

    #[test]
    fn parse_all_isolates_malformed_lines() {
        let mut batch = Batch::new(1, SystemTime::now());
        batch.messages.push(Ok(serialize(&message(0)).trim_end().to_string()));
        batch.messages.push(Ok("{not json".to_string()));
        batch.messages.push(Err(ParseFailure::new("", "line exceeded 8 bytes")));
        batch.messages.push(Ok(serialize(&message(3)).trim_end().to_string()));

        let parsed = batch.parse_all(&WireDefaults::default());
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].as_ref().unwrap().frame_id, 0);
        assert!(parsed[1].is_err());
        assert!(parsed[2].is_err());
        assert_eq!(parsed[3].as_ref().unwrap().frame_id, 3);
    }
}
