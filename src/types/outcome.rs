//! Per-frame and per-batch outcomes

use std::time::SystemTime;

use super::Shape;

/// Which processing step produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Parse,
    Decode,
    Transform,
    Sink,
}

/// Outcome of processing one wire line.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameResult {
    Success {
        frame_id: u64,
        output_location: String,
        original_shape: Shape,
        processed_shape: Shape,
    },
    Failure {
        /// `None` when the id could not be recovered from a malformed line
        frame_id: Option<u64>,
        kind: FailureKind,
        reason: String,
    },
}

impl FrameResult {
    pub fn failure(frame_id: Option<u64>, kind: FailureKind, reason: impl Into<String>) -> Self {
        FrameResult::Failure { frame_id, kind, reason: reason.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FrameResult::Success { .. })
    }

    pub fn frame_id(&self) -> Option<u64> {
        match self {
            FrameResult::Success { frame_id, .. } => Some(*frame_id),
            FrameResult::Failure { frame_id, .. } => *frame_id,
        }
    }

    /// Failure reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            FrameResult::Success { .. } => None,
            FrameResult::Failure { reason, .. } => Some(reason),
        }
    }
}

/// Summary emitted once every message of a batch has a result.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub sequence: u64,
    pub window_start: SystemTime,
    /// Results in arrival order
    pub results: Vec<FrameResult>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FrameResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} succeeded", self.succeeded(), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(frame_id: u64) -> FrameResult {
        let shape = Shape { height: 2, width: 2, channels: 3 };
        FrameResult::Success {
            frame_id,
            output_location: format!("frame_{:04}.jpg", frame_id),
            original_shape: shape,
            processed_shape: shape,
        }
    }

    #[test]
    fn summary_reports_success_over_total() {
        let summary = BatchSummary {
            sequence: 0,
            window_start: SystemTime::now(),
            results: vec![
                success(0),
                FrameResult::failure(Some(1), FailureKind::Transform, "transform error"),
                success(2),
            ],
        };

        assert_eq!(summary.to_string(), "2/3 succeeded");
        let failures: Vec<_> = summary.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].frame_id(), Some(1));
        assert_eq!(failures[0].reason(), Some("transform error"));
    }

    #[test]
    fn empty_summary_reads_zero_of_zero() {
        let summary = BatchSummary { sequence: 4, window_start: SystemTime::now(), results: vec![] };
        assert_eq!(summary.to_string(), "0/0 succeeded");
    }
}
